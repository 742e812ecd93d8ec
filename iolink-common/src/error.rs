use thiserror::Error;

/// Common error type for the IO-Link tools.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Zenoh error: {0}")]
    Zenoh(#[from] zenoh::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Gave up connecting to Zenoh after {attempts} attempts: {last_error}")]
    ConnectExhausted { attempts: u32, last_error: String },
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
