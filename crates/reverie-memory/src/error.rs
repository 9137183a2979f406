//! Error types for memory operations.

/// Errors returned by memory stores and the memory manager.
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    /// Backing store failure.
    #[error("store error: {0}")]
    Store(String),
}
