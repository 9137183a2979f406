//! Inbound message preprocessing and response dispatch.

use crate::compose::{ComposedState, CompositionMode, StateComposer};
use crate::error::ReverieCoreError;
use crate::generate::{LanguageModel, ModelClass, ObjectSchema};
use crate::ident::{memory_id, stable_id};
use crate::prompt::render_context;
use crate::registry::{Action, Evaluator, Registry};
use async_trait::async_trait;
use chrono::Utc;
use log::{debug, info, warn};
use reverie_memory::{Memory, MemoryContent, MemoryManager};
use reverie_protocol::{EventMsg, EventPayload, EventSink, InboundMessage, OutboundContent};
use std::sync::Arc;
use uuid::Uuid;

/// External capability that establishes user, room, and participant
/// records before any memory referencing them is written.
#[async_trait]
pub trait ConnectionBootstrap: Send + Sync {
    /// Ensure the platform connection exists for a user and room.
    async fn ensure_connection(
        &self,
        user_id: Uuid,
        room_id: Uuid,
        user_name: &str,
        user_screen_name: &str,
        source: &str,
    ) -> Result<(), ReverieCoreError>;
}

/// Result of preprocessing one inbound message.
#[derive(Debug, Clone)]
pub struct ProcessedMessage {
    /// The persisted inbound memory.
    pub memory: Memory,
    /// State composed around that memory.
    pub state: ComposedState,
}

/// Result of a completed response turn.
#[derive(Debug, Clone)]
pub struct RespondOutcome {
    /// Outbound memories persisted for the delivered chunks.
    pub memories: Vec<Memory>,
    /// State refreshed after delivery.
    pub state: ComposedState,
}

/// Turns raw platform messages into memories and composed state, and
/// dispatches response turns.
pub struct MessagePreprocessor {
    agent_id: Uuid,
    memories: Arc<MemoryManager>,
    composer: Arc<StateComposer>,
    bootstrap: Arc<dyn ConnectionBootstrap>,
    actions: Arc<Registry<dyn Action>>,
    evaluators: Arc<Registry<dyn Evaluator>>,
    model: Arc<dyn LanguageModel>,
    events: Option<Arc<dyn EventSink>>,
}

impl MessagePreprocessor {
    /// Create a preprocessor wired to its collaborators.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        agent_id: Uuid,
        memories: Arc<MemoryManager>,
        composer: Arc<StateComposer>,
        bootstrap: Arc<dyn ConnectionBootstrap>,
        actions: Arc<Registry<dyn Action>>,
        evaluators: Arc<Registry<dyn Evaluator>>,
        model: Arc<dyn LanguageModel>,
    ) -> Self {
        Self {
            agent_id,
            memories,
            composer,
            bootstrap,
            actions,
            evaluators,
            model,
            events: None,
        }
    }

    /// Attach an observability event sink.
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = Some(events);
        self
    }

    /// Ingest an inbound message: derive ids, bootstrap the connection,
    /// persist the memory, and compose state around it.
    pub async fn preprocess(
        &self,
        inbound: InboundMessage,
    ) -> Result<ProcessedMessage, ReverieCoreError> {
        let room_id = stable_id(&inbound.raw_room_id)?;
        let user_id = stable_id(&inbound.raw_user_id)?;

        self.bootstrap
            .ensure_connection(
                user_id,
                room_id,
                &inbound.user_name,
                &inbound.user_screen_name,
                &inbound.source,
            )
            .await?;

        let id = memory_id(&inbound.raw_message_id, self.agent_id)?;
        let in_reply_to = inbound
            .in_reply_to
            .as_deref()
            .and_then(|raw| memory_id(raw, self.agent_id).ok());
        let memory = Memory {
            id,
            agent_id: self.agent_id,
            user_id,
            room_id,
            content: MemoryContent {
                text: inbound.text.clone(),
                attachments: inbound.attachments.clone(),
                source: Some(inbound.source.clone()),
                in_reply_to,
                url: inbound.message_url.clone(),
                action: None,
            },
            unique: true,
            created_at: inbound.created_at.unwrap_or_else(Utc::now),
        };

        self.memories
            .create_memory(memory.clone(), Some(&inbound.source), true, true)
            .await
            .map_err(|err| ReverieCoreError::Memory(err.to_string()))?;

        let state = self.composer.compose(&memory, CompositionMode::Full).await?;

        self.emit(EventPayload::MessageReceived {
            room_id,
            user_id,
            memory_id: memory.id,
            source: inbound.source.clone(),
        });
        debug!(
            "message preprocessed (room_id={}, memory_id={})",
            room_id, memory.id
        );
        Ok(ProcessedMessage { memory, state })
    }

    /// Generate and deliver a response for a preprocessed message.
    ///
    /// Delivery happens through the caller's callback; each delivered
    /// chunk is persisted as its own outbound memory, state is
    /// refreshed, validated actions and evaluators run, and a sent
    /// event is emitted. Failures emit an error event and propagate.
    pub async fn respond<F, Fut>(
        &self,
        processed: &ProcessedMessage,
        template: &str,
        callback: F,
    ) -> Result<RespondOutcome, ReverieCoreError>
    where
        F: FnOnce(OutboundContent) -> Fut,
        Fut: Future<Output = Result<Vec<Memory>, ReverieCoreError>>,
    {
        match self.respond_inner(processed, template, callback).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                warn!(
                    "response turn failed (room_id={}, error={})",
                    processed.memory.room_id, err
                );
                self.emit(EventPayload::TurnFailed {
                    room_id: processed.memory.room_id,
                    message: err.to_string(),
                });
                Err(err)
            }
        }
    }

    async fn respond_inner<F, Fut>(
        &self,
        processed: &ProcessedMessage,
        template: &str,
        callback: F,
    ) -> Result<RespondOutcome, ReverieCoreError>
    where
        F: FnOnce(OutboundContent) -> Fut,
        Fut: Future<Output = Result<Vec<Memory>, ReverieCoreError>>,
    {
        let context = render_context(template, &processed.state, &processed.memory);
        let schema = ObjectSchema::required(&["text"]);
        let value = self
            .model
            .generate_object(&context, ModelClass::Large, &schema)
            .await?;
        schema.validate(&value)?;

        let text = value
            .get("text")
            .and_then(|text| text.as_str())
            .unwrap_or_default()
            .to_string();
        let action = value
            .get("action")
            .and_then(|action| action.as_str())
            .map(str::to_string);

        let content = OutboundContent {
            text,
            action: action.clone(),
            attachments: Vec::new(),
            in_reply_to: processed.memory.content.url.clone(),
        };
        let delivered = callback(content).await?;

        for chunk in &delivered {
            self.memories
                .create_memory(chunk.clone(), chunk.content.source.as_deref(), false, true)
                .await
                .map_err(|err| ReverieCoreError::Memory(err.to_string()))?;
        }

        let state = self
            .composer
            .compose(&processed.memory, CompositionMode::SkipKnowledge)
            .await?;

        if let Some(action_name) = &action {
            match self.actions.get(action_name) {
                Some(action) => {
                    action.handle(&processed.memory, &state).await?;
                }
                None => {
                    warn!("unknown response action (name={})", action_name);
                }
            }
        }

        for name in &state.evaluators {
            if let Some(evaluator) = self.evaluators.get(name) {
                evaluator.evaluate(&processed.memory, &state).await?;
            }
        }

        self.emit(EventPayload::MessageSent {
            room_id: processed.memory.room_id,
            memory_ids: delivered.iter().map(|memory| memory.id).collect(),
            action,
        });
        info!(
            "response delivered (room_id={}, chunks={})",
            processed.memory.room_id,
            delivered.len()
        );
        Ok(RespondOutcome {
            memories: delivered,
            state,
        })
    }

    /// Emit an observability event; sink failures never block the turn.
    fn emit(&self, payload: EventPayload) {
        if let Some(events) = &self.events {
            events.emit(EventMsg::now(self.agent_id, payload));
        }
    }
}
