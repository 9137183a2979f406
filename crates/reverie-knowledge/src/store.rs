//! Relational store contract and the JSONL reference implementation.

use crate::error::KnowledgeError;
use crate::model::KnowledgeItem;
use async_trait::async_trait;
use log::{debug, info};
use parking_lot::Mutex;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Relational persistence contract required by the knowledge manager.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Persist a new item or chunk.
    async fn create(&self, item: KnowledgeItem) -> Result<(), KnowledgeError>;

    /// Load an item by id.
    async fn get_by_id(&self, agent_id: Uuid, id: Uuid)
    -> Result<Option<KnowledgeItem>, KnowledgeError>;

    /// Load all chunks linked to a parent item.
    async fn get_chunks(
        &self,
        agent_id: Uuid,
        original_id: Uuid,
    ) -> Result<Vec<KnowledgeItem>, KnowledgeError>;

    /// Remove a single item by id.
    async fn remove(&self, agent_id: Uuid, id: Uuid) -> Result<(), KnowledgeError>;

    /// Remove all chunks linked to a parent item.
    async fn remove_chunks(&self, agent_id: Uuid, original_id: Uuid)
    -> Result<(), KnowledgeError>;

    /// Remove every item owned by an agent.
    async fn clear(&self, agent_id: Uuid) -> Result<(), KnowledgeError>;
}

/// File-backed knowledge store holding one JSONL file per agent.
#[derive(Debug)]
pub struct JsonlKnowledgeStore {
    /// Root directory for agent files.
    root: PathBuf,
    /// Serialize write access to agent files.
    write_lock: Mutex<()>,
}

impl JsonlKnowledgeStore {
    /// Create a new JSONL store under the given root.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, KnowledgeError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        info!("initialized JSONL knowledge store (root={})", root.display());
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    /// Path to the agent JSONL file.
    fn agent_path(&self, agent_id: Uuid) -> PathBuf {
        self.root.join(format!("{agent_id}.jsonl"))
    }

    /// Path to the temporary agent file used for rewrites.
    fn temp_path(&self, agent_id: Uuid) -> PathBuf {
        self.root.join(format!("{agent_id}.jsonl.tmp"))
    }

    /// Load all items for an agent in append order.
    fn load_items(&self, agent_id: Uuid) -> Result<Vec<KnowledgeItem>, KnowledgeError> {
        let path = self.agent_path(agent_id);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let file = OpenOptions::new().read(true).open(path)?;
        let reader = BufReader::new(file);
        let mut items = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let item: KnowledgeItem = serde_json::from_str(&line)?;
            items.push(item);
        }
        Ok(items)
    }

    /// Rewrite an agent's items atomically.
    fn write_items(&self, agent_id: Uuid, items: &[KnowledgeItem]) -> Result<(), KnowledgeError> {
        let path = self.agent_path(agent_id);
        let temp_path = self.temp_path(agent_id);
        {
            let mut file = OpenOptions::new()
                .create(true)
                .truncate(true)
                .write(true)
                .open(&temp_path)?;
            for item in items {
                let line = serde_json::to_string(item)?;
                writeln!(file, "{line}")?;
            }
        }
        if path.exists() {
            fs::remove_file(&path)?;
        }
        fs::rename(temp_path, path)?;
        Ok(())
    }

    /// Remove items matching a predicate, rewriting the file.
    fn retain(
        &self,
        agent_id: Uuid,
        keep: impl Fn(&KnowledgeItem) -> bool,
    ) -> Result<(), KnowledgeError> {
        let _guard = self.write_lock.lock();
        let items = self.load_items(agent_id)?;
        let remaining = items.into_iter().filter(keep).collect::<Vec<_>>();
        self.write_items(agent_id, &remaining)
    }
}

#[async_trait]
impl KnowledgeStore for JsonlKnowledgeStore {
    async fn create(&self, item: KnowledgeItem) -> Result<(), KnowledgeError> {
        let _guard = self.write_lock.lock();
        let path = self.agent_path(item.agent_id);
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        let line = serde_json::to_string(&item)?;
        writeln!(file, "{line}")?;
        debug!(
            "stored knowledge item (agent_id={}, item_id={}, chunk={})",
            item.agent_id, item.id, item.content.metadata.is_chunk
        );
        Ok(())
    }

    async fn get_by_id(
        &self,
        agent_id: Uuid,
        id: Uuid,
    ) -> Result<Option<KnowledgeItem>, KnowledgeError> {
        Ok(self
            .load_items(agent_id)?
            .into_iter()
            .find(|item| item.id == id))
    }

    async fn get_chunks(
        &self,
        agent_id: Uuid,
        original_id: Uuid,
    ) -> Result<Vec<KnowledgeItem>, KnowledgeError> {
        let mut chunks = self
            .load_items(agent_id)?
            .into_iter()
            .filter(|item| item.content.metadata.original_id == Some(original_id))
            .collect::<Vec<_>>();
        chunks.sort_by_key(|item| item.content.metadata.chunk_index);
        Ok(chunks)
    }

    async fn remove(&self, agent_id: Uuid, id: Uuid) -> Result<(), KnowledgeError> {
        self.retain(agent_id, |item| item.id != id)
    }

    async fn remove_chunks(
        &self,
        agent_id: Uuid,
        original_id: Uuid,
    ) -> Result<(), KnowledgeError> {
        self.retain(agent_id, |item| {
            item.content.metadata.original_id != Some(original_id)
        })
    }

    async fn clear(&self, agent_id: Uuid) -> Result<(), KnowledgeError> {
        let _guard = self.write_lock.lock();
        let path = self.agent_path(agent_id);
        if path.exists() {
            info!("clearing knowledge (agent_id={})", agent_id);
            fs::remove_file(path)?;
        }
        Ok(())
    }
}
