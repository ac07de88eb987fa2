use thiserror::Error;

/// Common error type for skycast components.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid channel name: {0}")]
    Channel(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using skycast's Error.
pub type Result<T> = std::result::Result<T, Error>;
