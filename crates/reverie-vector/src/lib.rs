//! Vector index contract and embedding support for reverie.
//!
//! This crate owns the similarity-index contract the runtime requires,
//! an in-memory reference implementation, and the embedding provider
//! seam used by memory and knowledge persistence.

mod embed;
mod error;
mod hash;
mod store;

/// Embedding provider contract and local deterministic embedder.
pub use embed::{EmbeddingProvider, HashEmbedder, cosine_similarity, is_zero_vector};
/// Vector error type.
pub use error::VectorError;
/// Content hashing for dedup lookups.
pub use hash::content_hash;
/// Vector index contract and in-memory implementation.
pub use store::{InMemoryVectorStore, MetadataFilter, VectorMatch, VectorRecord, VectorStore};
