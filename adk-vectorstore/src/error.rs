//! Error types for the `adk-vectorstore` crate.

use thiserror::Error;

/// Errors that can occur in vector store adapter operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Invalid configuration or mismatched inputs (e.g. `texts` and
    /// `metadatas` of different lengths).
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The backing collection does not exist.
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    /// An error reported by the database client.
    #[error("Backend error ({backend}): {message}")]
    BackendError {
        /// The backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// An error reported by the embedding provider.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },
}

impl StoreError {
    pub(crate) fn backend(backend: &str, message: impl Into<String>) -> Self {
        Self::BackendError { backend: backend.to_string(), message: message.into() }
    }

    pub(crate) fn embedding(provider: &str, message: impl Into<String>) -> Self {
        Self::EmbeddingError { provider: provider.to_string(), message: message.into() }
    }
}

/// A convenience result type for vector store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
