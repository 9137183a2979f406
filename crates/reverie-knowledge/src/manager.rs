//! Knowledge ingestion and retrieval over relational and vector stores.

use crate::error::KnowledgeError;
use crate::model::{
    BatchItem, FileKind, KnowledgeContent, KnowledgeItem, KnowledgeMetadata, RetrievedKnowledge,
};
use crate::preprocess::{chunk_text, preprocess, token_count, truncate_tokens};
use crate::rerank::{extract_terms, rerank_score};
use crate::store::KnowledgeStore;
use chrono::Utc;
use log::{debug, error, info, warn};
use reverie_protocol::{EventMsg, EventPayload, EventSink};
use reverie_vector::{
    EmbeddingProvider, MetadataFilter, VectorRecord, VectorStore, content_hash,
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Tag recorded on every knowledge vector record.
const VECTOR_KIND: &str = "knowledge";

/// Retrieval and chunking policy for a knowledge manager.
#[derive(Debug, Clone)]
pub struct KnowledgePolicy {
    /// Minimum similarity score for retrieval results.
    pub match_threshold: f32,
    /// Chunk size in whitespace tokens.
    pub chunk_size: usize,
    /// Overlap between adjacent chunks in tokens.
    pub chunk_overlap: usize,
    /// Default number of items returned per query.
    pub default_limit: usize,
}

impl Default for KnowledgePolicy {
    /// Default knowledge policy settings.
    fn default() -> Self {
        Self {
            match_threshold: 0.85,
            chunk_size: 512,
            chunk_overlap: 20,
            default_limit: 5,
        }
    }
}

/// Outcome summary for a batch ingestion call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Items ingested or skipped as duplicates.
    pub succeeded: usize,
    /// Items that failed and were logged.
    pub failed: usize,
}

/// Owns long-form knowledge lifecycle for one agent.
pub struct KnowledgeManager {
    agent_id: Uuid,
    policy: KnowledgePolicy,
    store: Arc<dyn KnowledgeStore>,
    vectors: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    events: Option<Arc<dyn EventSink>>,
}

impl KnowledgeManager {
    /// Create a manager scoped to one agent.
    pub fn new(
        agent_id: Uuid,
        policy: KnowledgePolicy,
        store: Arc<dyn KnowledgeStore>,
        vectors: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            agent_id,
            policy,
            store,
            vectors,
            embedder,
            events: None,
        }
    }

    /// Attach an observability event sink.
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = Some(events);
        self
    }

    /// Ingest one knowledge item: normalize, dedup, chunk, embed, persist.
    ///
    /// Empty text is a logged no-op, as is byte-identical previously
    /// ingested content. Vector writes are awaited so retrieval
    /// immediately after ingestion sees the new records.
    pub async fn create_knowledge(&self, item: KnowledgeItem) -> Result<(), KnowledgeError> {
        if item.content.text.trim().is_empty() {
            debug!("skipping empty knowledge item (item_id={})", item.id);
            return Ok(());
        }

        let normalized = preprocess(&item.content.text);
        let input_hash = content_hash(&normalized);
        if self.hash_exists(&input_hash).await? {
            debug!(
                "knowledge content already ingested, skipping (item_id={}, input_hash={})",
                item.id, input_hash
            );
            return Ok(());
        }

        let chunks = chunk_text(&normalized, self.policy.chunk_size, self.policy.chunk_overlap);
        let mut texts = Vec::with_capacity(chunks.len() + 1);
        texts.push(normalized.clone());
        texts.extend(chunks.iter().cloned());
        let embeddings = self.embedder.embed_batch(&texts).await?;

        let mut metadata = item.content.metadata.clone();
        metadata.is_main = true;
        metadata.is_chunk = false;
        metadata.input_hash = Some(input_hash.clone());
        let parent = KnowledgeItem {
            id: item.id,
            agent_id: self.agent_id,
            content: KnowledgeContent {
                text: item.content.text.clone(),
                metadata: metadata.clone(),
            },
            created_at: Utc::now(),
        };

        let mut records = vec![VectorRecord {
            id: parent.id,
            vector: embeddings[0].clone(),
            metadata: json!({
                "kind": VECTOR_KIND,
                "input_hash": input_hash,
                "is_main": true,
                "shared": metadata.shared,
            }),
        }];
        self.store.create(parent.clone()).await?;

        for (index, chunk) in chunks.iter().enumerate() {
            let chunk_id = chunk_item_id(parent.id, index);
            let chunk_hash = content_hash(chunk);
            let chunk_item = KnowledgeItem {
                id: chunk_id,
                agent_id: self.agent_id,
                content: KnowledgeContent {
                    text: chunk.clone(),
                    metadata: KnowledgeMetadata {
                        source: metadata.source.clone(),
                        kind: metadata.kind.clone(),
                        shared: metadata.shared,
                        is_main: false,
                        is_chunk: true,
                        original_id: Some(parent.id),
                        chunk_index: Some(index),
                        input_hash: Some(chunk_hash.clone()),
                        ..Default::default()
                    },
                },
                created_at: Utc::now(),
            };
            self.store.create(chunk_item).await?;
            records.push(VectorRecord {
                id: chunk_id,
                vector: embeddings[index + 1].clone(),
                metadata: json!({
                    "kind": VECTOR_KIND,
                    "input_hash": chunk_hash,
                    "is_chunk": true,
                    "original_id": parent.id,
                }),
            });
        }

        self.vectors.upsert(self.agent_id, records).await?;
        info!(
            "knowledge ingested (item_id={}, chunks={})",
            parent.id,
            chunks.len()
        );
        if let Some(events) = &self.events {
            events.emit(EventMsg::now(
                self.agent_id,
                EventPayload::KnowledgeIngested {
                    item_id: parent.id,
                    chunk_count: chunks.len(),
                    source: metadata.source.clone(),
                },
            ));
        }
        Ok(())
    }

    /// Retrieve the most relevant knowledge for a query.
    ///
    /// Candidates are over-fetched, threshold-filtered, deduplicated by
    /// content hash, lexically reranked, and truncated when a parent
    /// item exceeds the chunk size.
    pub async fn get_knowledge(
        &self,
        query: &str,
        conversation_context: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<RetrievedKnowledge>, KnowledgeError> {
        let limit = limit.unwrap_or(self.policy.default_limit);
        let processed_query = preprocess(query);
        let search_text = match conversation_context {
            Some(context) => format!("{} {}", preprocess(context), processed_query),
            None => processed_query.clone(),
        };
        let vector = self.embedder.embed(&search_text).await?;

        let filter = MetadataFilter::none().with("kind", VECTOR_KIND);
        let matches = self
            .vectors
            .search(self.agent_id, &vector, limit.saturating_mul(2).max(2), filter)
            .await?;

        let mut by_hash: HashMap<String, RetrievedKnowledge> = HashMap::new();
        for candidate in matches {
            if candidate.score < self.policy.match_threshold {
                continue;
            }
            let Some(item) = self.store.get_by_id(self.agent_id, candidate.record.id).await? else {
                warn!(
                    "vector match missing from relational store (item_id={})",
                    candidate.record.id
                );
                continue;
            };
            let hash = item
                .content
                .metadata
                .input_hash
                .clone()
                .unwrap_or_else(|| content_hash(&item.content.text));
            let retrieved = RetrievedKnowledge {
                item,
                score: candidate.score,
            };
            match by_hash.get(&hash) {
                Some(existing) if existing.score >= retrieved.score => {}
                _ => {
                    by_hash.insert(hash, retrieved);
                }
            }
        }

        let terms = extract_terms(&processed_query);
        let has_context = conversation_context.is_some();
        let mut results = Vec::new();
        for mut retrieved in by_hash.into_values() {
            retrieved.score = rerank_score(
                retrieved.score,
                &terms,
                &retrieved.item.content.text,
                has_context,
            );
            if retrieved.score < self.policy.match_threshold {
                continue;
            }
            self.truncate_oversized(&mut retrieved.item);
            results.push(retrieved);
        }

        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results.truncate(limit);
        debug!(
            "knowledge retrieved (query_len={}, results={})",
            query.len(),
            results.len()
        );
        Ok(results)
    }

    /// Remove an item, its chunks, and their vectors; all attempted.
    pub async fn remove_knowledge(&self, id: Uuid) -> Result<(), KnowledgeError> {
        let chunk_filter = MetadataFilter::none()
            .with("kind", VECTOR_KIND)
            .with("original_id", json!(id));
        let (parent_vector, chunk_vectors, relational) = tokio::join!(
            self.vectors.remove_by_id(self.agent_id, id),
            self.vectors.remove_by_filter(self.agent_id, chunk_filter),
            async {
                self.store.remove_chunks(self.agent_id, id).await?;
                self.store.remove(self.agent_id, id).await
            }
        );
        if let Err(err) = parent_vector {
            warn!("vector removal failed (item_id={}, error={})", id, err);
        }
        if let Err(err) = chunk_vectors {
            warn!("chunk vector removal failed (item_id={}, error={})", id, err);
        }
        relational
    }

    /// Remove every knowledge item and vector owned by this agent.
    pub async fn clear_knowledge(&self) -> Result<(), KnowledgeError> {
        let filter = MetadataFilter::none().with("kind", VECTOR_KIND);
        let (vector_result, store_result) = tokio::join!(
            self.vectors.remove_by_filter(self.agent_id, filter),
            self.store.clear(self.agent_id)
        );
        if let Err(err) = vector_result {
            warn!("vector clear failed (agent_id={}, error={})", self.agent_id, err);
        }
        store_result
    }

    /// Ingest a knowledge file, replacing previous content when changed.
    ///
    /// Unchanged content (full-text comparison) is skipped; changed
    /// content removes the old item and all chunks before re-ingesting.
    pub async fn process_file(
        &self,
        path: &str,
        content: &str,
        kind: FileKind,
        shared: bool,
    ) -> Result<(), KnowledgeError> {
        let id = file_item_id(path);
        if let Some(existing) = self.store.get_by_id(self.agent_id, id).await? {
            if existing.content.text == content {
                debug!("knowledge file unchanged, skipping (path={})", path);
                return Ok(());
            }
            info!("knowledge file changed, replacing (path={})", path);
            self.remove_knowledge(id).await?;
        }

        let item = KnowledgeItem {
            id,
            agent_id: self.agent_id,
            content: KnowledgeContent {
                text: content.to_string(),
                metadata: KnowledgeMetadata {
                    source: Some(path.to_string()),
                    kind: Some(kind.as_str().to_string()),
                    shared,
                    ..Default::default()
                },
            },
            created_at: Utc::now(),
        };
        self.create_knowledge(item).await
    }

    /// Ingest a batch of direct strings and files, tolerating failures.
    ///
    /// Each item failure is logged and the loop continues; a summary
    /// warning is emitted when any item failed.
    pub async fn process_batch(&self, items: Vec<BatchItem>) -> Result<BatchOutcome, KnowledgeError> {
        let mut outcome = BatchOutcome::default();
        for batch_item in items {
            let result = match &batch_item {
                BatchItem::Direct { text, shared } => {
                    let item = KnowledgeItem {
                        id: direct_item_id(text),
                        agent_id: self.agent_id,
                        content: KnowledgeContent {
                            text: text.clone(),
                            metadata: KnowledgeMetadata {
                                kind: Some("direct".to_string()),
                                shared: *shared,
                                ..Default::default()
                            },
                        },
                        created_at: Utc::now(),
                    };
                    self.create_knowledge(item).await
                }
                BatchItem::File {
                    path,
                    content,
                    kind,
                    shared,
                } => self.process_file(path, content, *kind, *shared).await,
            };
            match result {
                Ok(()) => outcome.succeeded += 1,
                Err(err) => {
                    outcome.failed += 1;
                    error!("batch knowledge item failed (error={})", err);
                }
            }
        }
        if outcome.failed > 0 {
            warn!(
                "batch knowledge ingestion finished with failures (succeeded={}, failed={})",
                outcome.succeeded, outcome.failed
            );
        }
        Ok(outcome)
    }

    /// Check the vector index for previously ingested content by hash.
    async fn hash_exists(&self, input_hash: &str) -> Result<bool, KnowledgeError> {
        let filter = MetadataFilter::none()
            .with("kind", VECTOR_KIND)
            .with("input_hash", input_hash);
        let matches = self.vectors.search(self.agent_id, &[], 1, filter).await?;
        Ok(!matches.is_empty())
    }

    /// Truncate an oversized parent item, recording the original length.
    fn truncate_oversized(&self, item: &mut KnowledgeItem) {
        if !item.content.metadata.is_main {
            return;
        }
        if token_count(&item.content.text) <= self.policy.chunk_size {
            return;
        }
        let original_length = item.content.text.chars().count();
        item.content.text = truncate_tokens(&item.content.text, self.policy.chunk_size);
        item.content.metadata.truncated = true;
        item.content.metadata.original_length = Some(original_length);
    }
}

/// Deterministic id for a knowledge file by path.
pub fn file_item_id(path: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, path.as_bytes())
}

/// Deterministic id for a direct knowledge string by normalized content.
pub fn direct_item_id(text: &str) -> Uuid {
    Uuid::new_v5(
        &Uuid::NAMESPACE_OID,
        content_hash(&preprocess(text)).as_bytes(),
    )
}

/// Deterministic id for a chunk by parent id and position.
fn chunk_item_id(parent_id: Uuid, index: usize) -> Uuid {
    Uuid::new_v5(&parent_id, format!("chunk:{index}").as_bytes())
}

#[cfg(test)]
mod tests {
    use super::{KnowledgeManager, KnowledgePolicy, file_item_id};
    use crate::model::{KnowledgeContent, KnowledgeItem, KnowledgeMetadata};
    use crate::store::{JsonlKnowledgeStore, KnowledgeStore};
    use async_trait::async_trait;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use reverie_vector::{EmbeddingProvider, InMemoryVectorStore, VectorError};
    use std::sync::Arc;
    use tempfile::tempdir;
    use uuid::Uuid;

    /// Embedder that scores every text identically, so retrieval order
    /// is decided entirely by the lexical reranker.
    struct ConstantEmbedder;

    #[async_trait]
    impl EmbeddingProvider for ConstantEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, VectorError> {
            Ok(vec![1.0, 0.0])
        }

        fn dimensions(&self) -> usize {
            2
        }

        fn model_name(&self) -> &str {
            "constant"
        }
    }

    fn words(count: usize) -> String {
        (0..count)
            .map(|i| format!("word{i}"))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn manager(
        policy: KnowledgePolicy,
        store: Arc<JsonlKnowledgeStore>,
        vectors: Arc<InMemoryVectorStore>,
    ) -> KnowledgeManager {
        KnowledgeManager::new(
            Uuid::new_v4(),
            policy,
            store,
            vectors,
            Arc::new(ConstantEmbedder),
        )
    }

    fn direct_item(text: &str) -> KnowledgeItem {
        KnowledgeItem {
            id: Uuid::new_v4(),
            agent_id: Uuid::new_v4(),
            content: KnowledgeContent {
                text: text.to_string(),
                metadata: KnowledgeMetadata::default(),
            },
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn empty_text_is_skipped() {
        let temp = tempdir().expect("tempdir");
        let store = Arc::new(JsonlKnowledgeStore::new(temp.path()).expect("store"));
        let vectors = Arc::new(InMemoryVectorStore::new());
        let manager = manager(KnowledgePolicy::default(), store.clone(), vectors.clone());

        let item = direct_item("   ");
        manager.create_knowledge(item.clone()).await.expect("create");
        assert_eq!(
            store
                .get_by_id(manager.agent_id, item.id)
                .await
                .expect("get"),
            None
        );
    }

    #[tokio::test]
    async fn long_text_produces_parent_and_sequential_chunks() {
        let temp = tempdir().expect("tempdir");
        let store = Arc::new(JsonlKnowledgeStore::new(temp.path()).expect("store"));
        let vectors = Arc::new(InMemoryVectorStore::new());
        let policy = KnowledgePolicy {
            chunk_size: 512,
            chunk_overlap: 20,
            ..KnowledgePolicy::default()
        };
        let manager = manager(policy, store.clone(), vectors.clone());

        let item = direct_item(&words(2000));
        let parent_id = item.id;
        manager.create_knowledge(item).await.expect("create");

        let parent = store
            .get_by_id(manager.agent_id, parent_id)
            .await
            .expect("get")
            .expect("parent");
        assert!(parent.content.metadata.is_main);

        let chunks = store
            .get_chunks(manager.agent_id, parent_id)
            .await
            .expect("chunks");
        assert!(chunks.len() >= 3);
        for (index, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.content.metadata.chunk_index, Some(index));
            assert!(chunk.content.metadata.is_chunk);
            assert_eq!(chunk.content.metadata.original_id, Some(parent_id));
        }
        // parent vector plus one per chunk
        assert_eq!(vectors.len(manager.agent_id), chunks.len() + 1);
    }

    #[tokio::test]
    async fn identical_content_is_deduplicated_by_hash() {
        let temp = tempdir().expect("tempdir");
        let store = Arc::new(JsonlKnowledgeStore::new(temp.path()).expect("store"));
        let vectors = Arc::new(InMemoryVectorStore::new());
        let manager = manager(KnowledgePolicy::default(), store.clone(), vectors.clone());

        let first = direct_item("rust is a systems language");
        manager.create_knowledge(first.clone()).await.expect("create");
        let count_after_first = vectors.len(manager.agent_id);

        let second = direct_item("rust is a systems language");
        manager.create_knowledge(second.clone()).await.expect("create");

        assert_eq!(vectors.len(manager.agent_id), count_after_first);
        assert_eq!(
            store
                .get_by_id(manager.agent_id, second.id)
                .await
                .expect("get"),
            None
        );
    }

    #[tokio::test]
    async fn retrieval_reranks_matches_and_attenuates_misses() {
        let temp = tempdir().expect("tempdir");
        let store = Arc::new(JsonlKnowledgeStore::new(temp.path()).expect("store"));
        let vectors = Arc::new(InMemoryVectorStore::new());
        let policy = KnowledgePolicy {
            match_threshold: 0.85,
            ..KnowledgePolicy::default()
        };
        let manager = manager(policy, store.clone(), vectors.clone());

        manager
            .create_knowledge(direct_item("javascript frameworks and their tradeoffs"))
            .await
            .expect("create");
        manager
            .create_knowledge(direct_item("gardening tips spring vegetables"))
            .await
            .expect("create");

        // every candidate has base score 1.0 under the constant embedder
        let results = manager
            .get_knowledge("javascript frameworks", None, Some(5))
            .await
            .expect("get");

        assert_eq!(results.len(), 1);
        assert!(results[0].item.content.text.contains("javascript"));
        assert!(results[0].score > 1.0);
    }

    #[tokio::test]
    async fn retrieval_never_returns_below_threshold() {
        let temp = tempdir().expect("tempdir");
        let store = Arc::new(JsonlKnowledgeStore::new(temp.path()).expect("store"));
        let vectors = Arc::new(InMemoryVectorStore::new());
        let manager = manager(KnowledgePolicy::default(), store.clone(), vectors.clone());

        manager
            .create_knowledge(direct_item("completely unrelated content here"))
            .await
            .expect("create");

        let results = manager
            .get_knowledge("javascript frameworks", None, None)
            .await
            .expect("get");
        assert_eq!(results, Vec::new());
    }

    #[tokio::test]
    async fn oversized_parent_is_truncated_with_original_length() {
        let temp = tempdir().expect("tempdir");
        let store = Arc::new(JsonlKnowledgeStore::new(temp.path()).expect("store"));
        let vectors = Arc::new(InMemoryVectorStore::new());
        let policy = KnowledgePolicy {
            match_threshold: 0.1,
            chunk_size: 10,
            chunk_overlap: 2,
            ..KnowledgePolicy::default()
        };
        let manager = manager(policy, store.clone(), vectors.clone());

        let text = format!("searchterm {}", words(40));
        let original_chars = text.chars().count();
        manager.create_knowledge(direct_item(&text)).await.expect("create");

        let results = manager
            .get_knowledge("searchterm", None, Some(10))
            .await
            .expect("get");
        let parent = results
            .iter()
            .find(|result| result.item.content.metadata.is_main)
            .expect("parent result");
        assert!(parent.item.content.metadata.truncated);
        assert_eq!(
            parent.item.content.metadata.original_length,
            Some(original_chars)
        );
        assert_eq!(
            parent.item.content.text.split_whitespace().count(),
            10
        );
    }

    #[tokio::test]
    async fn changed_file_content_replaces_parent_and_chunks() {
        let temp = tempdir().expect("tempdir");
        let store = Arc::new(JsonlKnowledgeStore::new(temp.path()).expect("store"));
        let vectors = Arc::new(InMemoryVectorStore::new());
        let policy = KnowledgePolicy {
            chunk_size: 10,
            chunk_overlap: 2,
            ..KnowledgePolicy::default()
        };
        let manager = manager(policy, store.clone(), vectors.clone());
        let path = "facts/rust.md";
        let id = file_item_id(path);

        manager
            .process_file(path, &words(30), super::FileKind::Markdown, false)
            .await
            .expect("first ingest");
        let first_chunks = store.get_chunks(manager.agent_id, id).await.expect("chunks");

        // unchanged content is skipped outright
        manager
            .process_file(path, &words(30), super::FileKind::Markdown, false)
            .await
            .expect("unchanged ingest");
        assert_eq!(
            store
                .get_chunks(manager.agent_id, id)
                .await
                .expect("chunks")
                .len(),
            first_chunks.len()
        );

        let new_content = words(50);
        manager
            .process_file(path, &new_content, super::FileKind::Markdown, false)
            .await
            .expect("changed ingest");

        let new_chunks = store.get_chunks(manager.agent_id, id).await.expect("chunks");
        let expected = crate::preprocess::chunk_text(
            &crate::preprocess::preprocess(&new_content),
            10,
            2,
        );
        assert_eq!(new_chunks.len(), expected.len());
        let parent = store
            .get_by_id(manager.agent_id, id)
            .await
            .expect("get")
            .expect("parent");
        assert_eq!(parent.content.text, new_content);
    }

    #[tokio::test]
    async fn batch_ingestion_tolerates_item_failures() {
        let temp = tempdir().expect("tempdir");
        let store = Arc::new(JsonlKnowledgeStore::new(temp.path()).expect("store"));
        let vectors = Arc::new(InMemoryVectorStore::new());
        let manager = manager(KnowledgePolicy::default(), store.clone(), vectors.clone());

        let outcome = manager
            .process_batch(vec![
                super::BatchItem::Direct {
                    text: "first fact".to_string(),
                    shared: false,
                },
                super::BatchItem::Direct {
                    text: "second fact".to_string(),
                    shared: false,
                },
            ])
            .await
            .expect("batch");
        assert_eq!(outcome.succeeded, 2);
        assert_eq!(outcome.failed, 0);
    }
}
