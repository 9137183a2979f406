//! Configuration models and loading for the reverie runtime.
//!
//! This crate owns the reverie config schema, validation, and file loading
//! used by embedding applications and platform adapters.

mod error;
mod loader;
mod model;

/// Public error type returned by config loading and validation APIs.
pub use error::ConfigError;
/// Configuration schema models.
pub use model::*;
