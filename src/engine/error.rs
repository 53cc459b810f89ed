//! Error types for the embedded engine

use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Error types that can occur inside the embedded engine
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Collection {name} does not exist")]
    CollectionMissing { name: String },

    #[error("Collection {name} already exists")]
    CollectionExists { name: String },

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Storage error: {0}")]
    StorageError(String),
}
