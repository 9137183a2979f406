//! Relational store contract and the JSONL reference implementation.

use crate::error::MemoryError;
use crate::model::{Memory, RoomQuery};
use async_trait::async_trait;
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Relational persistence contract required by the memory manager.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Persist a new memory record.
    async fn create(&self, memory: Memory) -> Result<(), MemoryError>;

    /// Load a record by id, across all rooms.
    async fn get_by_id(&self, id: Uuid) -> Result<Option<Memory>, MemoryError>;

    /// Load records for a room, most-recent-first.
    async fn get_by_room(&self, room_id: Uuid, query: RoomQuery)
    -> Result<Vec<Memory>, MemoryError>;

    /// Load records across rooms, newest first, optionally user-scoped.
    async fn get_by_rooms(
        &self,
        room_ids: &[Uuid],
        limit: Option<usize>,
        user_id: Option<Uuid>,
    ) -> Result<Vec<Memory>, MemoryError>;

    /// Remove a single record by id.
    async fn remove(&self, id: Uuid) -> Result<(), MemoryError>;

    /// Remove every record in a room.
    async fn remove_by_room(&self, room_id: Uuid) -> Result<(), MemoryError>;

    /// Count records in a room.
    async fn count_by_room(&self, room_id: Uuid, unique: bool) -> Result<usize, MemoryError>;

    /// Count records authored by a user across all rooms.
    async fn count_by_user(&self, user_id: Uuid) -> Result<usize, MemoryError>;
}

/// File-backed memory store holding one JSONL file per room.
#[derive(Debug)]
pub struct JsonlMemoryStore {
    /// Root directory for room files.
    root: PathBuf,
    /// Serialize write access to room files.
    write_lock: Mutex<()>,
}

impl JsonlMemoryStore {
    /// Create a new JSONL store under the given root.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, MemoryError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        info!("initialized JSONL memory store (root={})", root.display());
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    /// Path to the room JSONL file.
    fn room_path(&self, room_id: Uuid) -> PathBuf {
        self.root.join(format!("{room_id}.jsonl"))
    }

    /// Path to the temporary room file used for rewrites.
    fn temp_path(&self, room_id: Uuid) -> PathBuf {
        self.root.join(format!("{room_id}.jsonl.tmp"))
    }

    /// Room ids present on disk.
    fn list_rooms(&self) -> Result<Vec<Uuid>, MemoryError> {
        let mut rooms = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("jsonl") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            if let Ok(room_id) = Uuid::parse_str(stem) {
                rooms.push(room_id);
            }
        }
        Ok(rooms)
    }

    /// Load all records for a room in append order.
    fn load_records(&self, room_id: Uuid) -> Result<Vec<Memory>, MemoryError> {
        let path = self.room_path(room_id);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let file = OpenOptions::new().read(true).open(path)?;
        let reader = BufReader::new(file);
        let mut records = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record: Memory = serde_json::from_str(&line)?;
            records.push(record);
        }
        Ok(records)
    }

    /// Rewrite a room's records atomically.
    fn write_records(&self, room_id: Uuid, records: &[Memory]) -> Result<(), MemoryError> {
        let path = self.room_path(room_id);
        let temp_path = self.temp_path(room_id);
        {
            let mut file = OpenOptions::new()
                .create(true)
                .truncate(true)
                .write(true)
                .open(&temp_path)?;
            for record in records {
                let line = serde_json::to_string(record)?;
                writeln!(file, "{line}")?;
            }
        }
        if path.exists() {
            fs::remove_file(&path)?;
        }
        fs::rename(temp_path, path)?;
        Ok(())
    }
}

/// Apply a room query's window and count to most-recent-first records.
fn apply_room_query(mut records: Vec<Memory>, query: RoomQuery) -> Vec<Memory> {
    if query.unique {
        records.retain(|record| record.unique);
    }
    let start = query.start.unwrap_or(0).min(records.len());
    let end = query.end.unwrap_or(records.len()).min(records.len());
    let mut window = if start < end {
        records.drain(start..end).collect::<Vec<_>>()
    } else {
        Vec::new()
    };
    window.truncate(query.count);
    window
}

#[async_trait]
impl MemoryStore for JsonlMemoryStore {
    async fn create(&self, memory: Memory) -> Result<(), MemoryError> {
        let _guard = self.write_lock.lock();
        let path = self.room_path(memory.room_id);
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        let line = serde_json::to_string(&memory)?;
        writeln!(file, "{line}")?;
        debug!(
            "stored memory record (room_id={}, memory_id={}, content_len={})",
            memory.room_id,
            memory.id,
            memory.content.text.len()
        );
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Memory>, MemoryError> {
        for room_id in self.list_rooms()? {
            if let Some(record) = self
                .load_records(room_id)?
                .into_iter()
                .find(|record| record.id == id)
            {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    async fn get_by_room(
        &self,
        room_id: Uuid,
        query: RoomQuery,
    ) -> Result<Vec<Memory>, MemoryError> {
        let mut records = self.load_records(room_id)?;
        records.reverse();
        Ok(apply_room_query(records, query))
    }

    async fn get_by_rooms(
        &self,
        room_ids: &[Uuid],
        limit: Option<usize>,
        user_id: Option<Uuid>,
    ) -> Result<Vec<Memory>, MemoryError> {
        let mut records = Vec::new();
        for room_id in room_ids {
            records.extend(self.load_records(*room_id)?);
        }
        if let Some(user_id) = user_id {
            records.retain(|record| record.user_id == user_id);
        }
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = limit {
            records.truncate(limit);
        }
        Ok(records)
    }

    async fn remove(&self, id: Uuid) -> Result<(), MemoryError> {
        let _guard = self.write_lock.lock();
        for room_id in self.list_rooms()? {
            let records = self.load_records(room_id)?;
            if records.iter().any(|record| record.id == id) {
                let remaining = records
                    .into_iter()
                    .filter(|record| record.id != id)
                    .collect::<Vec<_>>();
                self.write_records(room_id, &remaining)?;
                return Ok(());
            }
        }
        warn!("memory record not found for removal (memory_id={})", id);
        Ok(())
    }

    async fn remove_by_room(&self, room_id: Uuid) -> Result<(), MemoryError> {
        let _guard = self.write_lock.lock();
        let path = self.room_path(room_id);
        if path.exists() {
            info!("deleting room memories (room_id={})", room_id);
            fs::remove_file(path)?;
        }
        Ok(())
    }

    async fn count_by_room(&self, room_id: Uuid, unique: bool) -> Result<usize, MemoryError> {
        let records = self.load_records(room_id)?;
        if unique {
            Ok(records.iter().filter(|record| record.unique).count())
        } else {
            Ok(records.len())
        }
    }

    async fn count_by_user(&self, user_id: Uuid) -> Result<usize, MemoryError> {
        let mut count = 0;
        for room_id in self.list_rooms()? {
            count += self
                .load_records(room_id)?
                .iter()
                .filter(|record| record.user_id == user_id)
                .count();
        }
        Ok(count)
    }
}
