//! Error taxonomy shared by every backend adapter.
//!
//! Adapters translate their backend-native failures into [`StoreError`] at the
//! boundary, so no engine- or client-specific error type crosses the
//! [`VectorStore`](crate::store::VectorStore) contract.

use thiserror::Error;

/// Result type alias for vector store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Error types that can occur in vector store operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Invalid or incomplete deployment configuration. Raised before any I/O.
    #[error("Configuration error in `{setting}`: {message}")]
    Configuration { setting: String, message: String },

    #[error("Collection not found: {name}")]
    NotFound { name: String },

    #[error("Collection already exists: {name}")]
    AlreadyExists { name: String },

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Vector store is not initialized; call initialize() first")]
    NotInitialized,

    /// Transient backend failure. The crate never retries internally.
    #[error("{backend} backend unavailable: {reason}")]
    BackendUnavailable { backend: &'static str, reason: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl StoreError {
    /// Build a configuration error naming the offending setting.
    pub fn config(setting: impl Into<String>, message: impl Into<String>) -> Self {
        StoreError::Configuration {
            setting: setting.into(),
            message: message.into(),
        }
    }

    pub fn not_found(name: impl Into<String>) -> Self {
        StoreError::NotFound { name: name.into() }
    }

    pub fn already_exists(name: impl Into<String>) -> Self {
        StoreError::AlreadyExists { name: name.into() }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        StoreError::InvalidArgument(message.into())
    }

    pub fn unavailable(backend: &'static str, reason: impl Into<String>) -> Self {
        StoreError::BackendUnavailable {
            backend,
            reason: reason.into(),
        }
    }

    /// Whether a caller-side retry could reasonably succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::BackendUnavailable { .. })
    }
}
