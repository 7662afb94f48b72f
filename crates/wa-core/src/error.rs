//! Error types for wa-core

use thiserror::Error;

/// Main error type for wa-core
#[derive(Error, Debug)]
pub enum Error {
    /// The automation client failed to start up. Carries the client's own
    /// message so the caller sees it unprefixed, as the client reported it.
    #[error("{0}")]
    Initialization(String),

    #[error("WhatsApp client not authenticated")]
    NotAuthenticated,

    #[error("Invalid WID: {0} is not registered on WhatsApp")]
    RecipientNotFound(String),

    #[error("Another initialize or logout is in progress")]
    Busy,

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Session storage error: {0}")]
    Storage(String),

    /// Error reported by the automation client, passed through verbatim
    #[error("{0}")]
    Client(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for wa-core
pub type Result<T> = std::result::Result<T, Error>;
