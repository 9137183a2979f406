//! Error types for knowledge ingestion and retrieval.

/// Errors returned by knowledge stores and the knowledge manager.
#[derive(Debug, thiserror::Error)]
pub enum KnowledgeError {
    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    /// Embedding or vector index failure.
    #[error("vector error: {0}")]
    Vector(#[from] reverie_vector::VectorError),
    /// Backing store failure.
    #[error("store error: {0}")]
    Store(String),
}
