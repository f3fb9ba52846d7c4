//! Error types for appdist-update.

use appdist_login::HandoffError;
use appdist_storage::StorageError;
use thiserror::Error;

/// Result type for update operations.
pub type UpdateResult<T> = std::result::Result<T, UpdateError>;

/// Errors that can occur during update operations.
///
/// None of these is fatal to the host: the workflow absorbs them at the cycle
/// level and the cycle ends without an update.
#[derive(Debug, Error)]
pub enum UpdateError {
    // Network errors
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Failed to connect to update server: {message}")]
    ConnectionFailed { message: String },

    #[error("Update server returned error {status}: {message}")]
    ServerError { status: u16, message: String },

    // Release payload errors
    #[error("Invalid release details: {message}")]
    InvalidRelease { message: String },

    // Authorization errors
    #[error("Authorization rejected: {0}")]
    AuthorizationRejected(#[from] HandoffError),

    // Persisted state errors
    #[error("Malformed persisted entry {key}: {value:?}")]
    MalformedState { key: &'static str, value: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    // Download errors
    #[error("Download failed: {message}")]
    DownloadFailed { message: String },

    // Installation errors
    #[error("Installation failed: {message}")]
    InstallFailed { message: String },

    // Host errors
    #[error("Failed to open login page: {message}")]
    BrowserUnavailable { message: String },

    #[error("No tokio runtime available to run update tasks")]
    NoRuntime,

    // Config errors
    #[error("Invalid configuration: {message}")]
    ConfigError { message: String },

    // File system errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handoff_conversion() {
        let err: UpdateError = HandoffError::RequestIdMismatch.into();
        assert!(matches!(err, UpdateError::AuthorizationRejected(_)));
    }
}
