//! Vector index contract and the in-memory reference implementation.

use crate::embed::{cosine_similarity, is_zero_vector};
use crate::error::VectorError;
use async_trait::async_trait;
use log::{debug, warn};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// A record stored in the vector index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VectorRecord {
    /// Record identifier; upserts overwrite by id.
    pub id: Uuid,
    /// Dense embedding vector.
    pub vector: Vec<f32>,
    /// Metadata used for filtering and dedup lookups.
    pub metadata: Value,
}

/// A ranked search result with similarity score.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorMatch {
    /// The matching record.
    pub record: VectorRecord,
    /// Cosine similarity against the query vector.
    pub score: f32,
}

/// Exact-match metadata filter applied before ranking.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MetadataFilter {
    /// Key/value pairs that must all match exactly.
    pub equals: Vec<(String, Value)>,
}

impl MetadataFilter {
    /// Create an empty filter that matches everything.
    pub fn none() -> Self {
        Self::default()
    }

    /// Add an exact-match condition.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.equals.push((key.into(), value.into()));
        self
    }

    /// True when all conditions match the given metadata object.
    pub fn matches(&self, metadata: &Value) -> bool {
        self.equals
            .iter()
            .all(|(key, expected)| metadata.get(key) == Some(expected))
    }
}

/// Contract the runtime requires from a similarity index.
///
/// The dedup-lookup idiom: to check whether content with a known hash
/// already exists, search with a zero vector, `top_k = 1`, and an
/// `input_hash` filter condition; a non-empty result means a duplicate.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or overwrite records by id within a namespace.
    async fn upsert(&self, namespace: Uuid, records: Vec<VectorRecord>) -> Result<(), VectorError>;

    /// Rank records in a namespace against a query vector.
    ///
    /// A degenerate (empty or all-zero) query skips ranking and returns
    /// filter matches with a zero score.
    async fn search(
        &self,
        namespace: Uuid,
        vector: &[f32],
        top_k: usize,
        filter: MetadataFilter,
    ) -> Result<Vec<VectorMatch>, VectorError>;

    /// Remove a single record by id.
    async fn remove_by_id(&self, namespace: Uuid, id: Uuid) -> Result<(), VectorError>;

    /// Remove all records matching a metadata filter.
    async fn remove_by_filter(
        &self,
        namespace: Uuid,
        filter: MetadataFilter,
    ) -> Result<(), VectorError>;

    /// Remove every record in a namespace.
    async fn remove_all(&self, namespace: Uuid) -> Result<(), VectorError>;
}

/// In-memory vector index keyed by namespace.
#[derive(Default)]
pub struct InMemoryVectorStore {
    /// Namespace map of record id to record.
    namespaces: RwLock<HashMap<Uuid, HashMap<Uuid, VectorRecord>>>,
}

impl InMemoryVectorStore {
    /// Create an empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count records in a namespace.
    pub fn len(&self, namespace: Uuid) -> usize {
        self.namespaces
            .read()
            .get(&namespace)
            .map(HashMap::len)
            .unwrap_or(0)
    }

    /// True when a namespace holds no records.
    pub fn is_empty(&self, namespace: Uuid) -> bool {
        self.len(namespace) == 0
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert(&self, namespace: Uuid, records: Vec<VectorRecord>) -> Result<(), VectorError> {
        let mut namespaces = self.namespaces.write();
        let entries = namespaces.entry(namespace).or_default();
        debug!(
            "upserting vector records (namespace={}, count={})",
            namespace,
            records.len()
        );
        for record in records {
            entries.insert(record.id, record);
        }
        Ok(())
    }

    async fn search(
        &self,
        namespace: Uuid,
        vector: &[f32],
        top_k: usize,
        filter: MetadataFilter,
    ) -> Result<Vec<VectorMatch>, VectorError> {
        let namespaces = self.namespaces.read();
        let Some(entries) = namespaces.get(&namespace) else {
            return Ok(Vec::new());
        };

        let filter_only = is_zero_vector(vector);
        let mut matches = Vec::new();
        for record in entries.values() {
            if !filter.matches(&record.metadata) {
                continue;
            }
            let score = if filter_only {
                0.0
            } else if record.vector.len() != vector.len() {
                warn!(
                    "skipping record with mismatched dimensions (id={}, expected={}, actual={})",
                    record.id,
                    vector.len(),
                    record.vector.len()
                );
                continue;
            } else {
                cosine_similarity(vector, &record.vector)
            };
            matches.push(VectorMatch {
                record: record.clone(),
                score,
            });
        }

        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches.truncate(top_k);
        Ok(matches)
    }

    async fn remove_by_id(&self, namespace: Uuid, id: Uuid) -> Result<(), VectorError> {
        if let Some(entries) = self.namespaces.write().get_mut(&namespace) {
            entries.remove(&id);
        }
        Ok(())
    }

    async fn remove_by_filter(
        &self,
        namespace: Uuid,
        filter: MetadataFilter,
    ) -> Result<(), VectorError> {
        if let Some(entries) = self.namespaces.write().get_mut(&namespace) {
            entries.retain(|_, record| !filter.matches(&record.metadata));
        }
        Ok(())
    }

    async fn remove_all(&self, namespace: Uuid) -> Result<(), VectorError> {
        self.namespaces.write().remove(&namespace);
        Ok(())
    }
}
