//! Read-only state composition for a single generation turn.

use crate::error::ReverieCoreError;
use crate::registry::{Action, ContextProvider, Evaluator, Registry};
use async_trait::async_trait;
use chrono::Duration;
use futures_util::future::join_all;
use log::{debug, warn};
use reverie_config::CompositionSettings;
use reverie_knowledge::{KnowledgeManager, RetrievedKnowledge};
use reverie_memory::{Memory, MemoryManager, RoomQuery};
use reverie_protocol::Attachment;
use std::sync::Arc;
use uuid::Uuid;

/// Goals fetched per room for composed state.
const GOAL_COUNT: usize = 5;

/// Placeholder substituted for stale attachment text.
pub const REDACTED_ATTACHMENT_TEXT: &str = "[attachment content expired]";

/// Static character data folded into every composed state.
#[derive(Debug, Clone, Default)]
pub struct CharacterProfile {
    /// Agent display name.
    pub name: String,
    /// Biography lines.
    pub bio: Vec<String>,
    /// Lore and backstory lines.
    pub lore: Vec<String>,
    /// Topics the agent cares about.
    pub topics: Vec<String>,
}

/// A goal tracked for a room.
#[derive(Debug, Clone, PartialEq)]
pub struct Goal {
    /// Goal identifier.
    pub id: Uuid,
    /// Goal name.
    pub name: String,
    /// Current status label.
    pub status: String,
    /// Objective descriptions.
    pub objectives: Vec<String>,
}

/// External registry of goals per room.
#[async_trait]
pub trait GoalStore: Send + Sync {
    /// Fetch in-progress goals for a room.
    async fn goals_for_room(&self, room_id: Uuid, count: usize)
    -> Result<Vec<Goal>, ReverieCoreError>;
}

/// A participant visible in a room.
#[derive(Debug, Clone, PartialEq)]
pub struct Actor {
    /// Stable user id.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Platform handle.
    pub screen_name: String,
}

/// External directory of room participants.
#[async_trait]
pub trait ActorDirectory: Send + Sync {
    /// Fetch the participants of a room.
    async fn actors_for_room(&self, room_id: Uuid) -> Result<Vec<Actor>, ReverieCoreError>;
}

/// Composition policy for one turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositionMode {
    /// Full composition including knowledge retrieval.
    Full,
    /// Skip the network-bound knowledge retrieval step.
    SkipKnowledge,
}

/// The read-only aggregate handed to generation for one turn.
///
/// Built fresh per turn and never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedState {
    /// Agent that composed the state.
    pub agent_id: Uuid,
    /// Agent display name.
    pub agent_name: String,
    /// Room the turn belongs to.
    pub room_id: Uuid,
    /// Character biography text.
    pub bio: String,
    /// Character lore text.
    pub lore: String,
    /// Recent room messages, most recent first.
    pub recent_messages: Vec<Memory>,
    /// Formatted recent messages for the prompt.
    pub recent_messages_text: String,
    /// Recent interactions with the sender across the room.
    pub recent_interactions: Vec<Memory>,
    /// Relevant knowledge for the anchor message.
    pub knowledge: Vec<RetrievedKnowledge>,
    /// Goals tracked for the room.
    pub goals: Vec<Goal>,
    /// Participants of the room.
    pub actors: Vec<Actor>,
    /// Fresh and redacted attachments in scope for the turn.
    pub attachments: Vec<Attachment>,
    /// Names of actions that validated for this turn.
    pub actions: Vec<String>,
    /// Names of evaluators that validated for this turn.
    pub evaluators: Vec<String>,
    /// Concatenated context provider output.
    pub providers_text: String,
}

/// Assembles `ComposedState` from memory, knowledge, and registries.
pub struct StateComposer {
    agent_id: Uuid,
    character: CharacterProfile,
    memories: Arc<MemoryManager>,
    knowledge: Arc<KnowledgeManager>,
    goals: Arc<dyn GoalStore>,
    actors: Arc<dyn ActorDirectory>,
    actions: Arc<Registry<dyn Action>>,
    evaluators: Arc<Registry<dyn Evaluator>>,
    providers: Arc<Registry<dyn ContextProvider>>,
    settings: CompositionSettings,
}

impl StateComposer {
    /// Create a composer wired to its collaborators.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        agent_id: Uuid,
        character: CharacterProfile,
        memories: Arc<MemoryManager>,
        knowledge: Arc<KnowledgeManager>,
        goals: Arc<dyn GoalStore>,
        actors: Arc<dyn ActorDirectory>,
        actions: Arc<Registry<dyn Action>>,
        evaluators: Arc<Registry<dyn Evaluator>>,
        providers: Arc<Registry<dyn ContextProvider>>,
        settings: CompositionSettings,
    ) -> Self {
        Self {
            agent_id,
            character,
            memories,
            knowledge,
            goals,
            actors,
            actions,
            evaluators,
            providers,
            settings,
        }
    }

    /// Compose the full state for a turn anchored on one memory.
    ///
    /// Independent reads fan out concurrently; component validation runs
    /// as a second phase because sender-name resolution depends on the
    /// fetched actors.
    pub async fn compose(
        &self,
        anchor: &Memory,
        mode: CompositionMode,
    ) -> Result<ComposedState, ReverieCoreError> {
        let room_id = anchor.room_id;

        let recent_fut = self.memories.get_memories(
            room_id,
            RoomQuery {
                count: self.settings.conversation_length,
                unique: false,
                start: None,
                end: None,
            },
        );
        let knowledge_fut = async {
            match mode {
                CompositionMode::SkipKnowledge => Ok(Vec::new()),
                CompositionMode::Full => {
                    self.knowledge
                        .get_knowledge(&anchor.content.text, None, None)
                        .await
                }
            }
        };
        let room_ids = [room_id];
        let interactions_fut = self.memories.get_memories_by_rooms(
            &room_ids,
            Some(self.settings.recent_interactions),
            Some(anchor.user_id),
        );
        let goals_fut = self.goals.goals_for_room(room_id, GOAL_COUNT);
        let actors_fut = self.actors.actors_for_room(room_id);

        let (recent, knowledge, interactions, goals, actors) = tokio::join!(
            recent_fut,
            knowledge_fut,
            interactions_fut,
            goals_fut,
            actors_fut
        );
        let recent = recent.map_err(|err| ReverieCoreError::Memory(err.to_string()))?;
        let knowledge =
            knowledge.map_err(|err| ReverieCoreError::Knowledge(err.to_string()))?;
        let interactions =
            interactions.map_err(|err| ReverieCoreError::Memory(err.to_string()))?;
        let goals = goals?;
        let actors = actors?;

        let recent_messages_text =
            format_messages(&recent, &actors, self.agent_id, &self.character.name);
        let attachments = aggregate_attachments(
            anchor,
            &recent,
            Duration::minutes(self.settings.attachment_window_mins),
        );

        let mut state = ComposedState {
            agent_id: self.agent_id,
            agent_name: self.character.name.clone(),
            room_id,
            bio: self.character.bio.join("\n"),
            lore: self.character.lore.join("\n"),
            recent_messages: recent,
            recent_messages_text,
            recent_interactions: interactions,
            knowledge,
            goals,
            actors,
            attachments,
            actions: Vec::new(),
            evaluators: Vec::new(),
            providers_text: String::new(),
        };

        let (actions, evaluators, providers_text) = tokio::join!(
            validated_action_names(&self.actions, anchor, &state),
            validated_evaluator_names(&self.evaluators, anchor, &state),
            provider_context(&self.providers, anchor, &state)
        );
        state.actions = actions;
        state.evaluators = evaluators;
        state.providers_text = providers_text;

        debug!(
            "state composed (room_id={}, recent={}, knowledge={}, actions={})",
            room_id,
            state.recent_messages.len(),
            state.knowledge.len(),
            state.actions.len()
        );
        Ok(state)
    }
}

/// Names of actions that validate for the turn, checked concurrently.
async fn validated_action_names(
    registry: &Registry<dyn Action>,
    anchor: &Memory,
    state: &ComposedState,
) -> Vec<String> {
    let checks = registry.all().into_iter().map(|action| async move {
        if action.validate(anchor, state).await {
            Some(action.name().to_string())
        } else {
            None
        }
    });
    join_all(checks).await.into_iter().flatten().collect()
}

/// Names of evaluators that validate for the turn, checked concurrently.
async fn validated_evaluator_names(
    registry: &Registry<dyn Evaluator>,
    anchor: &Memory,
    state: &ComposedState,
) -> Vec<String> {
    let checks = registry.all().into_iter().map(|evaluator| async move {
        if evaluator.validate(anchor, state).await {
            Some(evaluator.name().to_string())
        } else {
            None
        }
    });
    join_all(checks).await.into_iter().flatten().collect()
}

/// Concatenated output of providers that validate for the turn.
async fn provider_context(
    registry: &Registry<dyn ContextProvider>,
    anchor: &Memory,
    state: &ComposedState,
) -> String {
    let contributions = registry.all().into_iter().map(|provider| async move {
        if !provider.validate(anchor, state).await {
            return None;
        }
        match provider.provide(anchor, state).await {
            Ok(text) if !text.trim().is_empty() => Some(text),
            Ok(_) => None,
            Err(err) => {
                warn!(
                    "context provider failed (name={}, error={})",
                    provider.name(),
                    err
                );
                None
            }
        }
    });
    join_all(contributions)
        .await
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join("\n")
}

/// Format recent messages most-recent-first as "name: text" lines.
fn format_messages(
    messages: &[Memory],
    actors: &[Actor],
    agent_id: Uuid,
    agent_name: &str,
) -> String {
    messages
        .iter()
        .map(|message| {
            let name = actors
                .iter()
                .find(|actor| actor.id == message.user_id)
                .map(|actor| actor.name.as_str())
                .unwrap_or(if message.user_id == agent_id {
                    agent_name
                } else {
                    "unknown"
                });
            format!("{name}: {}", message.content.text)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Gather attachments for the turn, redacting stale extracted text.
///
/// Attachments from room history within the window before the newest
/// attachment-bearing message stay intact; older ones keep their entry
/// with the extracted text replaced so provenance stays visible.
fn aggregate_attachments(
    anchor: &Memory,
    recent: &[Memory],
    window: Duration,
) -> Vec<Attachment> {
    let newest = recent
        .iter()
        .chain(std::iter::once(anchor))
        .filter(|memory| !memory.content.attachments.is_empty())
        .map(|memory| memory.created_at)
        .max();
    let Some(newest) = newest else {
        return Vec::new();
    };
    let cutoff = newest - window;

    let mut attachments = anchor.content.attachments.clone();
    for memory in recent {
        if memory.id == anchor.id {
            continue;
        }
        for attachment in &memory.content.attachments {
            if memory.created_at >= cutoff {
                attachments.push(attachment.clone());
            } else {
                let mut redacted = attachment.clone();
                redacted.text = Some(REDACTED_ATTACHMENT_TEXT.to_string());
                attachments.push(redacted);
            }
        }
    }
    attachments
}

#[cfg(test)]
mod tests {
    use super::{REDACTED_ATTACHMENT_TEXT, Actor, aggregate_attachments, format_messages};
    use chrono::{Duration, Utc};
    use pretty_assertions::assert_eq;
    use reverie_memory::{Memory, MemoryContent};
    use reverie_protocol::Attachment;
    use uuid::Uuid;

    fn attachment(id: &str, text: &str) -> Attachment {
        Attachment {
            id: id.to_string(),
            url: format!("https://files.example/{id}"),
            title: id.to_string(),
            text: Some(text.to_string()),
            content_type: None,
        }
    }

    fn memory_with(
        room_id: Uuid,
        attachments: Vec<Attachment>,
        age_mins: i64,
    ) -> Memory {
        Memory {
            id: Uuid::new_v4(),
            agent_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            room_id,
            content: MemoryContent {
                text: "msg".to_string(),
                attachments,
                ..Default::default()
            },
            unique: true,
            created_at: Utc::now() - Duration::minutes(age_mins),
        }
    }

    #[test]
    fn stale_attachment_text_is_redacted_not_removed() {
        let room_id = Uuid::new_v4();
        let anchor = memory_with(room_id, vec![attachment("current", "fresh text")], 0);
        let fresh = memory_with(room_id, vec![attachment("recent", "recent text")], 30);
        let stale = memory_with(room_id, vec![attachment("old", "old text")], 300);

        let attachments = aggregate_attachments(
            &anchor,
            &[fresh.clone(), stale.clone()],
            Duration::minutes(60),
        );

        assert_eq!(attachments.len(), 3);
        assert_eq!(attachments[0].text.as_deref(), Some("fresh text"));
        assert_eq!(attachments[1].text.as_deref(), Some("recent text"));
        assert_eq!(attachments[2].id, "old");
        assert_eq!(
            attachments[2].text.as_deref(),
            Some(REDACTED_ATTACHMENT_TEXT)
        );
    }

    #[test]
    fn no_attachments_yields_empty_aggregate() {
        let room_id = Uuid::new_v4();
        let anchor = memory_with(room_id, Vec::new(), 0);
        let other = memory_with(room_id, Vec::new(), 10);
        assert_eq!(
            aggregate_attachments(&anchor, &[other], Duration::minutes(60)),
            Vec::new()
        );
    }

    #[test]
    fn message_formatting_resolves_sender_names() {
        let agent_id = Uuid::new_v4();
        let room_id = Uuid::new_v4();
        let actor = Actor {
            id: Uuid::new_v4(),
            name: "Ada".to_string(),
            screen_name: "ada".to_string(),
        };
        let mut from_actor = memory_with(room_id, Vec::new(), 0);
        from_actor.user_id = actor.id;
        from_actor.content.text = "hello there".to_string();
        let mut from_agent = memory_with(room_id, Vec::new(), 1);
        from_agent.user_id = agent_id;
        from_agent.content.text = "hi!".to_string();

        let text = format_messages(
            &[from_actor, from_agent],
            &[actor],
            agent_id,
            "Reverie",
        );
        assert_eq!(text, "Ada: hello there\nReverie: hi!");
    }
}
