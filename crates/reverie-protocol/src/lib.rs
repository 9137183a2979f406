//! Wire types shared between platform adapters and the runtime core.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for an agent.
pub type AgentId = Uuid;
/// Unique identifier for a room.
pub type RoomId = Uuid;
/// Unique identifier for a user.
pub type UserId = Uuid;
/// Unique identifier for a memory record.
pub type MemoryId = Uuid;

/// Raw message handed to the preprocessor by a platform adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Platform-native message identifier.
    pub raw_message_id: String,
    /// Platform-native user identifier.
    pub raw_user_id: String,
    /// Display name for the sender.
    pub user_name: String,
    /// Handle or screen name for the sender.
    pub user_screen_name: String,
    /// Platform-native room or channel identifier.
    pub raw_room_id: String,
    /// Source platform tag (e.g. "discord", "twitter").
    pub source: String,
    /// Message text content.
    pub text: String,
    /// Attachments included with the message.
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    /// Platform-native id of the message this replies to.
    #[serde(default)]
    pub in_reply_to: Option<String>,
    /// Timestamp supplied by the platform, if any.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Canonical URL for the message, if any.
    #[serde(default)]
    pub message_url: Option<String>,
}

/// Attachment carried by a message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Attachment {
    /// Attachment identifier.
    pub id: String,
    /// Source URL for the attachment.
    pub url: String,
    /// Short title for display.
    pub title: String,
    /// Extracted text content, if any.
    #[serde(default)]
    pub text: Option<String>,
    /// Media type tag.
    #[serde(default)]
    pub content_type: Option<String>,
}

/// Content handed to a delivery callback for sending.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OutboundContent {
    /// Response text.
    pub text: String,
    /// Action tag selected by generation, if any.
    #[serde(default)]
    pub action: Option<String>,
    /// Attachments to deliver with the response.
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    /// Platform-native id of the message being replied to.
    #[serde(default)]
    pub in_reply_to: Option<String>,
}

/// Wrapper for observability events emitted by the runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMsg {
    /// Unique id for the event.
    pub id: Uuid,
    /// Agent that emitted the event.
    pub agent_id: AgentId,
    /// Timestamp when the event was created.
    pub created_at: DateTime<Utc>,
    /// Event payload content.
    pub payload: EventPayload,
}

/// All observability events emitted during a turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "payload")]
pub enum EventPayload {
    /// An inbound message was ingested.
    MessageReceived {
        room_id: RoomId,
        user_id: UserId,
        memory_id: MemoryId,
        source: String,
    },
    /// A response was generated and delivered.
    MessageSent {
        room_id: RoomId,
        memory_ids: Vec<MemoryId>,
        action: Option<String>,
    },
    /// Knowledge was ingested into the retrieval index.
    KnowledgeIngested {
        item_id: Uuid,
        chunk_count: usize,
        source: Option<String>,
    },
    /// A turn failed after the message was ingested.
    TurnFailed {
        room_id: RoomId,
        message: String,
    },
}

/// Sink interface for runtime observability events.
pub trait EventSink: Send + Sync {
    /// Emit an event to downstream listeners.
    fn emit(&self, event: EventMsg);
}

impl EventMsg {
    /// Build an event stamped with the current time.
    pub fn now(agent_id: AgentId, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            agent_id,
            created_at: Utc::now(),
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn event_payload_round_trips_through_json() {
        let event = EventMsg::now(
            Uuid::new_v4(),
            EventPayload::MessageReceived {
                room_id: Uuid::new_v4(),
                user_id: Uuid::new_v4(),
                memory_id: Uuid::new_v4(),
                source: "discord".to_string(),
            },
        );
        let encoded = serde_json::to_value(&event).expect("serialize");
        let decoded: EventMsg = serde_json::from_value(encoded.clone()).expect("deserialize");
        let decoded_value = serde_json::to_value(decoded).expect("serialize decoded");
        assert_eq!(decoded_value, encoded);
    }

    #[test]
    fn inbound_message_defaults_optional_fields() {
        let value = json!({
            "raw_message_id": "123",
            "raw_user_id": "u1",
            "user_name": "Ada",
            "user_screen_name": "ada",
            "raw_room_id": "room-1",
            "source": "discord",
            "text": "hello"
        });
        let message: InboundMessage = serde_json::from_value(value).expect("deserialize");
        assert_eq!(message.attachments, Vec::new());
        assert_eq!(message.in_reply_to, None);
        assert_eq!(message.created_at, None);
    }
}
