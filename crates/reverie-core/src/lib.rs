//! Core runtime primitives for reverie.
//!
//! This crate owns identity derivation, the outbound request queue,
//! engagement tracking, component registries, state composition, and
//! the message preprocessing pipeline that platform adapters drive.

pub mod compose;
pub mod error;
pub mod generate;
pub mod ident;
pub mod interest;
pub mod preprocess;
pub mod prompt;
pub mod queue;
pub mod registry;

/// Composed state and the composer that builds it.
pub use compose::{
    Actor, ActorDirectory, CharacterProfile, ComposedState, CompositionMode, Goal, GoalStore,
    StateComposer,
};
/// Core error type.
pub use error::ReverieCoreError;
/// Generation dispatch contract.
pub use generate::{LanguageModel, ModelClass, ObjectSchema};
/// Deterministic identity derivation.
pub use ident::{memory_id, stable_id};
/// Per-room engagement tracking.
pub use interest::{InterestMessage, InterestState, InterestStore, is_dismissal};
/// Message preprocessing and response dispatch.
pub use preprocess::{ConnectionBootstrap, MessagePreprocessor, ProcessedMessage, RespondOutcome};
/// Prompt rendering from composed state.
pub use prompt::render_context;
/// Outbound request queue.
pub use queue::RequestQueue;
/// Component registries and contracts.
pub use registry::{Action, ContextProvider, Evaluator, Registered, Registry};
