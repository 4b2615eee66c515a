//! Error types for CloudProbe

use thiserror::Error;

/// Result type alias using CloudProbe Error
pub type Result<T> = std::result::Result<T, Error>;

/// CloudProbe error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unknown resource kind: {0}")]
    UnknownKind(String),

    #[error("Unknown account tier: {0}")]
    UnknownTier(String),

    #[error("Invalid connect line: {0}")]
    InvalidConnectLine(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
