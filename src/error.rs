//! Error types for the shipper
//!
//! Runtime errors (`BufferError`, `DeliveryError`, `DrainError`) are contained
//! inside the engine and logged. Only `ConfigError` escapes to the caller, at
//! construction time.

use thiserror::Error;

/// Result type for buffer store operations
pub type BufferResult<T> = Result<T, BufferError>;

/// Result type for engine construction and configuration
pub type ShipperResult<T> = Result<T, ConfigError>;

/// Errors raised by the local buffer store
#[derive(Debug, Error)]
pub enum BufferError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// The remote sink refused or failed to store a record
#[derive(Debug, Error)]
#[error("Delivery failed: {message}")]
pub struct DeliveryError {
    pub message: String,
}

impl DeliveryError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Why a drain round stopped before finishing
#[derive(Debug, Error)]
pub enum DrainError {
    #[error("buffer error on {file}: {source}")]
    Buffer {
        file: String,
        #[source]
        source: BufferError,
    },

    #[error("delivery error on {file}: {source}")]
    Delivery {
        file: String,
        #[source]
        source: DeliveryError,
    },
}

impl DrainError {
    /// Name of the buffer file being processed when the drain stopped
    pub fn file(&self) -> &str {
        match self {
            DrainError::Buffer { file, .. } | DrainError::Delivery { file, .. } => file,
        }
    }
}

/// Fatal errors raised while building a shipper
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required collaborator: {0}")]
    MissingCollaborator(&'static str),

    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },
}
