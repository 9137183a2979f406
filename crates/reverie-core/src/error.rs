//! Error types for the core runtime crate.

use thiserror::Error;

/// Errors returned by core runtime operations.
#[derive(Debug, Error)]
pub enum ReverieCoreError {
    /// A required identifier was empty or malformed.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// A queued task exceeded its hard deadline.
    #[error("queued task timed out")]
    QueueTimeout,
    /// The queue was torn down before the task completed.
    #[error("queue closed before task completion")]
    QueueClosed,
    /// Memory manager error.
    #[error("memory error: {0}")]
    Memory(String),
    /// Knowledge manager error.
    #[error("knowledge error: {0}")]
    Knowledge(String),
    /// Language model provider error.
    #[error("generation error: {0}")]
    Generation(String),
    /// Delivery callback error.
    #[error("delivery error: {0}")]
    Delivery(String),
    /// Connection bootstrap error.
    #[error("bootstrap error: {0}")]
    Bootstrap(String),
    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
