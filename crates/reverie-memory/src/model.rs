//! Memory record model used by stores and the manager.

use chrono::{DateTime, Utc};
use reverie_protocol::Attachment;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A persisted conversational event.
///
/// The id is a pure function of the platform-native message id and the
/// agent id, so re-ingesting the same raw message is idempotent. Records
/// are never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Memory {
    /// Deterministic record identifier.
    pub id: Uuid,
    /// Agent that owns the record.
    pub agent_id: Uuid,
    /// User that authored the event.
    pub user_id: Uuid,
    /// Room the event belongs to.
    pub room_id: Uuid,
    /// Event content.
    pub content: MemoryContent,
    /// Marked unique at creation time.
    #[serde(default)]
    pub unique: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Content payload of a memory record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct MemoryContent {
    /// Text content.
    pub text: String,
    /// Attachments carried by the event.
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    /// Source platform tag.
    #[serde(default)]
    pub source: Option<String>,
    /// Memory id of the event this replies to.
    #[serde(default)]
    pub in_reply_to: Option<Uuid>,
    /// Canonical URL for the event.
    #[serde(default)]
    pub url: Option<String>,
    /// Action tag attached by generation (e.g. "CONTINUE").
    #[serde(default)]
    pub action: Option<String>,
}

impl MemoryContent {
    /// Build a text-only content payload.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

/// Pagination and filtering options for room-scoped queries.
///
/// `start`/`end` are offsets into the most-recent-first ordering; the
/// window is sliced first, then `count` newest entries are taken.
#[derive(Debug, Clone, Copy)]
pub struct RoomQuery {
    /// Maximum records to return.
    pub count: usize,
    /// Restrict to records marked unique.
    pub unique: bool,
    /// Offset of the first record in the window.
    pub start: Option<usize>,
    /// Offset one past the last record in the window.
    pub end: Option<usize>,
}

impl RoomQuery {
    /// Query the newest `count` records.
    pub fn newest(count: usize) -> Self {
        Self {
            count,
            unique: true,
            start: None,
            end: None,
        }
    }
}

impl Default for RoomQuery {
    /// Default room query: ten newest unique records.
    fn default() -> Self {
        Self::newest(10)
    }
}
