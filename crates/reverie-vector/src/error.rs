//! Error types for vector index and embedding operations.

use thiserror::Error;

/// Errors returned by vector stores and embedding providers.
#[derive(Debug, Error)]
pub enum VectorError {
    /// Embedding dimensions do not match the index.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    /// Embedding provider failure.
    #[error("embedding error: {0}")]
    Embedding(String),
    /// Backing index failure.
    #[error("vector store error: {0}")]
    Store(String),
}
