//! Per-room conversational engagement tracking.

use chrono::{DateTime, Utc};
use log::debug;
use parking_lot::RwLock;
use reverie_config::InterestSettings;
use std::collections::{HashMap, VecDeque};
use uuid::Uuid;

/// Phrases that signal the bot should disengage from a room.
const DISMISSAL_PHRASES: &[&str] = &[
    "shut up",
    "stop talking",
    "go away",
    "leave me alone",
    "be quiet",
    "stop responding",
    "stfu",
    "dont talk",
    "don't talk",
    "stop replying",
];

/// A recent message tracked for an engaged room.
#[derive(Debug, Clone, PartialEq)]
pub struct InterestMessage {
    /// Author of the message.
    pub user_id: Uuid,
    /// Display name of the author.
    pub user_name: String,
    /// Message text.
    pub content: String,
}

/// Prior response context kept for similarity comparisons.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviousContext {
    /// Content of the previous response.
    pub content: String,
    /// When it was sent.
    pub timestamp: DateTime<Utc>,
}

/// Engagement state for one room.
#[derive(Debug, Clone, PartialEq)]
pub struct InterestState {
    /// Instance currently handling the room.
    pub current_handler: Option<String>,
    /// When the bot last sent a message here.
    pub last_message_sent: DateTime<Utc>,
    /// Bounded log of recent messages.
    pub messages: VecDeque<InterestMessage>,
    /// Previous response context, if tracked.
    pub previous_context: Option<PreviousContext>,
    /// Similarity threshold for context comparisons.
    pub context_similarity_threshold: Option<f32>,
}

/// Process-local engagement tracker keyed by room.
///
/// An entry's presence means the bot is engaged in that room; absence
/// means disengaged. Injected as a value so every session (and test)
/// gets its own instance.
pub struct InterestStore {
    rooms: RwLock<HashMap<Uuid, InterestState>>,
    settings: InterestSettings,
}

impl InterestStore {
    /// Create an empty store with the given settings.
    pub fn new(settings: InterestSettings) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            settings,
        }
    }

    /// Mark a room as engaged, handled by the named instance.
    pub fn engage(&self, room_id: Uuid, handler: impl Into<String>) {
        let mut rooms = self.rooms.write();
        let state = rooms.entry(room_id).or_insert_with(|| InterestState {
            current_handler: None,
            last_message_sent: Utc::now(),
            messages: VecDeque::new(),
            previous_context: None,
            context_similarity_threshold: Some(self.settings.similarity_threshold),
        });
        state.current_handler = Some(handler.into());
        debug!("room engaged (room_id={})", room_id);
    }

    /// True when the room has an engagement entry.
    pub fn is_engaged(&self, room_id: Uuid) -> bool {
        self.rooms.read().contains_key(&room_id)
    }

    /// Append a message to an engaged room's bounded log.
    ///
    /// A no-op for rooms that are not engaged.
    pub fn record_message(&self, room_id: Uuid, message: InterestMessage) {
        let mut rooms = self.rooms.write();
        if let Some(state) = rooms.get_mut(&room_id) {
            if self.settings.max_messages > 0 && state.messages.len() >= self.settings.max_messages
            {
                state.messages.pop_front();
            }
            state.messages.push_back(message);
        }
    }

    /// Record that the bot just sent a message in the room.
    pub fn touch_sent(&self, room_id: Uuid, previous_context: Option<PreviousContext>) {
        let mut rooms = self.rooms.write();
        if let Some(state) = rooms.get_mut(&room_id) {
            state.last_message_sent = Utc::now();
            if previous_context.is_some() {
                state.previous_context = previous_context;
            }
        }
    }

    /// Drop the engagement entry for a room.
    pub fn dismiss(&self, room_id: Uuid) {
        if self.rooms.write().remove(&room_id).is_some() {
            debug!("room disengaged (room_id={})", room_id);
        }
    }

    /// Snapshot the engagement state for a room.
    pub fn get(&self, room_id: Uuid) -> Option<InterestState> {
        self.rooms.read().get(&room_id).cloned()
    }

    /// Number of currently engaged rooms.
    pub fn len(&self) -> usize {
        self.rooms.read().len()
    }

    /// True when no rooms are engaged.
    pub fn is_empty(&self) -> bool {
        self.rooms.read().is_empty()
    }
}

/// True when a message reads as a dismissal of the bot.
pub fn is_dismissal(text: &str) -> bool {
    let lowered = text.to_lowercase();
    DISMISSAL_PHRASES
        .iter()
        .any(|phrase| lowered.contains(phrase))
}

#[cfg(test)]
mod tests {
    use super::{InterestMessage, InterestStore, is_dismissal};
    use pretty_assertions::assert_eq;
    use reverie_config::InterestSettings;
    use uuid::Uuid;

    fn message(content: &str) -> InterestMessage {
        InterestMessage {
            user_id: Uuid::new_v4(),
            user_name: "ada".to_string(),
            content: content.to_string(),
        }
    }

    #[test]
    fn engagement_entry_tracks_presence() {
        let store = InterestStore::new(InterestSettings::default());
        let room_id = Uuid::new_v4();
        assert!(!store.is_engaged(room_id));

        store.engage(room_id, "handler-1");
        assert!(store.is_engaged(room_id));

        store.dismiss(room_id);
        assert!(!store.is_engaged(room_id));
        assert!(store.is_empty());
    }

    #[test]
    fn message_log_is_bounded() {
        let settings = InterestSettings {
            max_messages: 3,
            ..InterestSettings::default()
        };
        let store = InterestStore::new(settings);
        let room_id = Uuid::new_v4();
        store.engage(room_id, "handler-1");

        for i in 0..5 {
            store.record_message(room_id, message(&format!("m{i}")));
        }
        let state = store.get(room_id).expect("state");
        assert_eq!(state.messages.len(), 3);
        assert_eq!(state.messages[0].content, "m2");
        assert_eq!(state.messages[2].content, "m4");
    }

    #[test]
    fn messages_for_unengaged_rooms_are_ignored() {
        let store = InterestStore::new(InterestSettings::default());
        let room_id = Uuid::new_v4();
        store.record_message(room_id, message("hello"));
        assert_eq!(store.get(room_id), None);
    }

    #[test]
    fn dismissal_phrases_are_detected() {
        assert!(is_dismissal("please just Shut Up already"));
        assert!(is_dismissal("go away bot"));
        assert!(!is_dismissal("tell me more about rust"));
    }
}
