//! Error types for discovery.

use thiserror::Error;

/// Result type alias using [`DiscoveryError`].
pub type Result<T> = std::result::Result<T, DiscoveryError>;

/// Errors that end a discovery session.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    Http(String),

    /// Registry serialization error.
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<iolink_common::Error> for DiscoveryError {
    fn from(err: iolink_common::Error) -> Self {
        Self::Config(err.to_string())
    }
}
