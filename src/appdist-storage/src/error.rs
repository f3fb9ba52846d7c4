//! Error types for appdist-storage.

use std::path::PathBuf;
use thiserror::Error;

/// Storage error types.
#[derive(Debug, Error)]
pub enum StorageError {
    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Entry exists but holds a value of another type.
    #[error("Entry {key} holds a {found}, expected a {expected}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        found: &'static str,
    },

    /// Invalid path.
    #[error("Invalid path: {0}")]
    InvalidPath(PathBuf),

    /// Home directory not found.
    #[error("Could not determine home/data directory")]
    HomeDirNotFound,
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
