//! Shared stubs for testing reverie crates.

mod llm;
mod runtime;

pub use llm::{FailingLanguageModel, FixedLanguageModel};
pub use runtime::{NullBootstrap, RecordingEventSink, StaticActors, StaticGoals};
