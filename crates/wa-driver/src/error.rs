//! Error types for wa-driver

use thiserror::Error;

/// wa-driver error type
#[derive(Error, Debug)]
pub enum DriverError {
    #[error("Failed to spawn bridge process: {0}")]
    Spawn(String),

    #[error("Bridge process exited: {0}")]
    Exited(String),

    /// Error string reported by the bridge itself, passed through as-is
    #[error("{0}")]
    Bridge(String),

    #[error("Bridge protocol error: {0}")]
    Protocol(String),

    #[error("Timeout: no response to {0}")]
    Timeout(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<DriverError> for wa_core::Error {
    fn from(err: DriverError) -> Self {
        match err {
            DriverError::Timeout(what) => {
                wa_core::Error::Timeout(format!("no response to {}", what))
            }
            DriverError::Bridge(message) => wa_core::Error::Client(message),
            other => wa_core::Error::Client(other.to_string()),
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, DriverError>;
