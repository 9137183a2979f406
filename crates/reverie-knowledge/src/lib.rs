//! Retrieval-augmented knowledge for reverie.
//!
//! This crate owns long-form knowledge ingestion (normalization,
//! chunking, content-hash dedup), semantic retrieval with lexical
//! reranking, and the relational store contract behind both.

pub mod error;
pub mod manager;
pub mod model;
pub mod preprocess;
pub mod rerank;
pub mod store;

/// Knowledge error type.
pub use error::KnowledgeError;
/// Knowledge manager, policy, and deterministic id helpers.
pub use manager::{BatchOutcome, KnowledgeManager, KnowledgePolicy, direct_item_id, file_item_id};
/// Knowledge item model and batch inputs.
pub use model::{
    BatchItem, FileKind, KnowledgeContent, KnowledgeItem, KnowledgeMetadata, RetrievedKnowledge,
};
/// Text normalization and chunking helpers.
pub use preprocess::{chunk_text, preprocess};
/// Relational store contract and JSONL implementation.
pub use store::{JsonlKnowledgeStore, KnowledgeStore};
