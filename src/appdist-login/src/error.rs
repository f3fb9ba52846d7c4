use thiserror::Error;

/// Errors raised while building or validating a login handoff.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HandoffError {
    #[error("Invalid login base URL: {0}")]
    InvalidBaseUrl(String),

    #[error("Login base URL must use http or https, got {0}")]
    UnsupportedScheme(String),

    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("No login request is pending")]
    NoPendingRequest,

    #[error("Request id does not match the pending login request")]
    RequestIdMismatch,
}

pub type Result<T> = std::result::Result<T, HandoffError>;
