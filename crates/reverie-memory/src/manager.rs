//! Memory lifecycle management over relational and vector stores.

use crate::error::MemoryError;
use crate::model::{Memory, RoomQuery};
use crate::store::MemoryStore;
use log::{debug, warn};
use reverie_vector::{EmbeddingProvider, MetadataFilter, VectorRecord, VectorStore, content_hash};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// Owns conversational memory lifecycle for one agent.
///
/// Relational writes are authoritative; vector writes are a best-effort
/// second phase that never fails the overall operation.
pub struct MemoryManager {
    agent_id: Uuid,
    table: String,
    store: Arc<dyn MemoryStore>,
    vectors: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl MemoryManager {
    /// Create a manager scoped to one agent and memory table.
    pub fn new(
        agent_id: Uuid,
        table: impl Into<String>,
        store: Arc<dyn MemoryStore>,
        vectors: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            agent_id,
            table: table.into(),
            store,
            vectors,
            embedder,
        }
    }

    /// Agent id this manager is scoped to.
    pub fn agent_id(&self) -> Uuid {
        self.agent_id
    }

    /// Persist a memory unless a record with the same id already exists.
    ///
    /// Duplicate ids are a logged no-op. When `vector_required` is set the
    /// embedding is written after the relational record; vector failures
    /// are logged and never propagate.
    pub async fn create_memory(
        &self,
        mut memory: Memory,
        source: Option<&str>,
        unique: bool,
        vector_required: bool,
    ) -> Result<(), MemoryError> {
        if self.store.get_by_id(memory.id).await?.is_some() {
            debug!(
                "memory already exists, skipping create (memory_id={})",
                memory.id
            );
            return Ok(());
        }

        memory.unique = unique;
        self.store.create(memory.clone()).await?;

        if vector_required {
            self.write_vector_best_effort(&memory, source).await;
        }
        Ok(())
    }

    /// Second phase of memory creation: embed and upsert, swallowing failure.
    async fn write_vector_best_effort(&self, memory: &Memory, source: Option<&str>) {
        let text = memory.content.text.trim();
        if text.is_empty() {
            debug!(
                "skipping vector write for blank memory text (memory_id={})",
                memory.id
            );
            return;
        }

        let vector = match self.embedder.embed(text).await {
            Ok(vector) => vector,
            Err(err) => {
                warn!(
                    "memory embedding failed (memory_id={}, error={})",
                    memory.id, err
                );
                return;
            }
        };
        if vector.is_empty() {
            warn!(
                "embedder returned empty vector, skipping upsert (memory_id={})",
                memory.id
            );
            return;
        }

        let record = VectorRecord {
            id: memory.id,
            vector,
            metadata: json!({
                "kind": self.table,
                "user_id": memory.user_id,
                "room_id": memory.room_id,
                "source": source,
                "input_hash": content_hash(text),
            }),
        };
        if let Err(err) = self.vectors.upsert(self.agent_id, vec![record]).await {
            warn!(
                "memory vector upsert failed (memory_id={}, error={})",
                memory.id, err
            );
        }
    }

    /// Load recent memories for a room.
    pub async fn get_memories(
        &self,
        room_id: Uuid,
        query: RoomQuery,
    ) -> Result<Vec<Memory>, MemoryError> {
        self.store.get_by_room(room_id, query).await
    }

    /// Load memories across rooms, optionally scoped to a user.
    pub async fn get_memories_by_rooms(
        &self,
        room_ids: &[Uuid],
        limit: Option<usize>,
        user_id: Option<Uuid>,
    ) -> Result<Vec<Memory>, MemoryError> {
        self.store.get_by_rooms(room_ids, limit, user_id).await
    }

    /// Load a memory by id, hiding records owned by other agents.
    pub async fn get_memory_by_id(&self, id: Uuid) -> Result<Option<Memory>, MemoryError> {
        let Some(memory) = self.store.get_by_id(id).await? else {
            return Ok(None);
        };
        if memory.agent_id != self.agent_id {
            debug!(
                "memory belongs to another agent (memory_id={}, owner={})",
                id, memory.agent_id
            );
            return Ok(None);
        }
        Ok(Some(memory))
    }

    /// Remove a memory from both stores; both removals are attempted.
    pub async fn remove_memory(&self, id: Uuid) -> Result<(), MemoryError> {
        let (vector_result, store_result) = tokio::join!(
            self.vectors.remove_by_id(self.agent_id, id),
            self.store.remove(id)
        );
        if let Err(err) = vector_result {
            warn!("vector removal failed (memory_id={}, error={})", id, err);
        }
        store_result
    }

    /// Remove every memory in a room from both stores.
    pub async fn remove_all_memories(&self, room_id: Uuid) -> Result<(), MemoryError> {
        let filter = MetadataFilter::none()
            .with("kind", self.table.clone())
            .with("room_id", json!(room_id));
        let (vector_result, store_result) = tokio::join!(
            self.vectors.remove_by_filter(self.agent_id, filter),
            self.store.remove_by_room(room_id)
        );
        if let Err(err) = vector_result {
            warn!(
                "vector room removal failed (room_id={}, error={})",
                room_id, err
            );
        }
        store_result
    }

    /// Count memories in a room.
    pub async fn count_memories(&self, room_id: Uuid, unique: bool) -> Result<usize, MemoryError> {
        self.store.count_by_room(room_id, unique).await
    }

    /// Count memories authored by a user.
    pub async fn count_memories_for_user(&self, user_id: Uuid) -> Result<usize, MemoryError> {
        self.store.count_by_user(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryManager;
    use crate::error::MemoryError;
    use crate::model::{Memory, MemoryContent, RoomQuery};
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use chrono::Utc;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use reverie_vector::{
        EmbeddingProvider, HashEmbedder, InMemoryVectorStore, MetadataFilter, VectorError,
        VectorStore,
    };
    use std::sync::Arc;
    use uuid::Uuid;

    #[derive(Default)]
    struct RecordingStore {
        records: Mutex<Vec<Memory>>,
        creates: Mutex<usize>,
    }

    #[async_trait]
    impl MemoryStore for RecordingStore {
        async fn create(&self, memory: Memory) -> Result<(), MemoryError> {
            *self.creates.lock() += 1;
            self.records.lock().push(memory);
            Ok(())
        }

        async fn get_by_id(&self, id: Uuid) -> Result<Option<Memory>, MemoryError> {
            Ok(self
                .records
                .lock()
                .iter()
                .find(|record| record.id == id)
                .cloned())
        }

        async fn get_by_room(
            &self,
            room_id: Uuid,
            query: RoomQuery,
        ) -> Result<Vec<Memory>, MemoryError> {
            let mut records = self
                .records
                .lock()
                .iter()
                .filter(|record| record.room_id == room_id)
                .cloned()
                .collect::<Vec<_>>();
            records.reverse();
            records.truncate(query.count);
            Ok(records)
        }

        async fn get_by_rooms(
            &self,
            room_ids: &[Uuid],
            _limit: Option<usize>,
            _user_id: Option<Uuid>,
        ) -> Result<Vec<Memory>, MemoryError> {
            Ok(self
                .records
                .lock()
                .iter()
                .filter(|record| room_ids.contains(&record.room_id))
                .cloned()
                .collect())
        }

        async fn remove(&self, id: Uuid) -> Result<(), MemoryError> {
            self.records.lock().retain(|record| record.id != id);
            Ok(())
        }

        async fn remove_by_room(&self, room_id: Uuid) -> Result<(), MemoryError> {
            self.records.lock().retain(|record| record.room_id != room_id);
            Ok(())
        }

        async fn count_by_room(&self, room_id: Uuid, _unique: bool) -> Result<usize, MemoryError> {
            Ok(self
                .records
                .lock()
                .iter()
                .filter(|record| record.room_id == room_id)
                .count())
        }

        async fn count_by_user(&self, user_id: Uuid) -> Result<usize, MemoryError> {
            Ok(self
                .records
                .lock()
                .iter()
                .filter(|record| record.user_id == user_id)
                .count())
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl EmbeddingProvider for FailingEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, VectorError> {
            Err(VectorError::DimensionMismatch {
                expected: 64,
                actual: 1536,
            })
        }

        fn dimensions(&self) -> usize {
            64
        }

        fn model_name(&self) -> &str {
            "failing"
        }
    }

    fn memory(agent_id: Uuid, text: &str) -> Memory {
        Memory {
            id: Uuid::new_v4(),
            agent_id,
            user_id: Uuid::new_v4(),
            room_id: Uuid::new_v4(),
            content: MemoryContent::text(text),
            unique: false,
            created_at: Utc::now(),
        }
    }

    fn manager(
        agent_id: Uuid,
        store: Arc<RecordingStore>,
        vectors: Arc<InMemoryVectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> MemoryManager {
        MemoryManager::new(agent_id, "messages", store, vectors, embedder)
    }

    #[tokio::test]
    async fn duplicate_create_is_a_no_op() {
        let agent_id = Uuid::new_v4();
        let store = Arc::new(RecordingStore::default());
        let vectors = Arc::new(InMemoryVectorStore::new());
        let manager = manager(
            agent_id,
            store.clone(),
            vectors,
            Arc::new(HashEmbedder::new(8)),
        );

        let record = memory(agent_id, "hello");
        manager
            .create_memory(record.clone(), Some("test"), false, false)
            .await
            .expect("first create");
        manager
            .create_memory(record, Some("test"), false, false)
            .await
            .expect("second create");

        assert_eq!(*store.creates.lock(), 1);
    }

    #[tokio::test]
    async fn vector_write_follows_relational_write() {
        let agent_id = Uuid::new_v4();
        let store = Arc::new(RecordingStore::default());
        let vectors = Arc::new(InMemoryVectorStore::new());
        let manager = manager(
            agent_id,
            store.clone(),
            vectors.clone(),
            Arc::new(HashEmbedder::new(8)),
        );

        let record = memory(agent_id, "remember this");
        manager
            .create_memory(record.clone(), Some("test"), true, true)
            .await
            .expect("create");

        assert_eq!(*store.creates.lock(), 1);
        assert_eq!(vectors.len(agent_id), 1);
        let matches = vectors
            .search(
                agent_id,
                &[],
                1,
                MetadataFilter::none().with("kind", "messages"),
            )
            .await
            .expect("search");
        assert_eq!(matches[0].record.id, record.id);
    }

    #[tokio::test]
    async fn embedding_failure_does_not_fail_create() {
        let agent_id = Uuid::new_v4();
        let store = Arc::new(RecordingStore::default());
        let vectors = Arc::new(InMemoryVectorStore::new());
        let manager = manager(
            agent_id,
            store.clone(),
            vectors.clone(),
            Arc::new(FailingEmbedder),
        );

        manager
            .create_memory(memory(agent_id, "hello"), Some("test"), false, true)
            .await
            .expect("create survives embed failure");

        assert_eq!(*store.creates.lock(), 1);
        assert_eq!(vectors.len(agent_id), 0);
    }

    #[tokio::test]
    async fn blank_text_skips_vector_write() {
        let agent_id = Uuid::new_v4();
        let store = Arc::new(RecordingStore::default());
        let vectors = Arc::new(InMemoryVectorStore::new());
        let manager = manager(
            agent_id,
            store.clone(),
            vectors.clone(),
            Arc::new(HashEmbedder::new(8)),
        );

        manager
            .create_memory(memory(agent_id, "   "), Some("test"), false, true)
            .await
            .expect("create");

        assert_eq!(*store.creates.lock(), 1);
        assert_eq!(vectors.len(agent_id), 0);
    }

    #[tokio::test]
    async fn get_by_id_hides_other_agents_records() {
        let agent_id = Uuid::new_v4();
        let store = Arc::new(RecordingStore::default());
        let vectors = Arc::new(InMemoryVectorStore::new());
        let manager = manager(
            agent_id,
            store.clone(),
            vectors,
            Arc::new(HashEmbedder::new(8)),
        );

        let foreign = memory(Uuid::new_v4(), "not yours");
        store.records.lock().push(foreign.clone());
        assert_eq!(
            manager.get_memory_by_id(foreign.id).await.expect("get"),
            None
        );

        let own = memory(agent_id, "mine");
        store.records.lock().push(own.clone());
        assert_eq!(
            manager.get_memory_by_id(own.id).await.expect("get"),
            Some(own)
        );
    }

    #[tokio::test]
    async fn removal_clears_both_stores() {
        let agent_id = Uuid::new_v4();
        let store = Arc::new(RecordingStore::default());
        let vectors = Arc::new(InMemoryVectorStore::new());
        let manager = manager(
            agent_id,
            store.clone(),
            vectors.clone(),
            Arc::new(HashEmbedder::new(8)),
        );

        let record = memory(agent_id, "to be removed");
        manager
            .create_memory(record.clone(), None, false, true)
            .await
            .expect("create");
        manager.remove_memory(record.id).await.expect("remove");

        assert_eq!(store.records.lock().len(), 0);
        assert_eq!(vectors.len(agent_id), 0);
    }
}
