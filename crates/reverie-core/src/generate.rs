//! Generation dispatch contract over a black-box model provider.

use crate::error::ReverieCoreError;
use async_trait::async_trait;
use serde_json::Value;

/// Model capability tier requested for a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelClass {
    /// Cheap model for classification and routing.
    Small,
    /// Mid-tier model.
    Medium,
    /// Strongest model for user-facing generation.
    Large,
}

/// Minimal schema a generated object must satisfy.
#[derive(Debug, Clone, Default)]
pub struct ObjectSchema {
    /// Keys that must be present on the generated object.
    pub required: Vec<String>,
}

impl ObjectSchema {
    /// Build a schema from required key names.
    pub fn required(keys: &[&str]) -> Self {
        Self {
            required: keys.iter().map(|key| key.to_string()).collect(),
        }
    }

    /// Validate a generated value against this schema.
    pub fn validate(&self, value: &Value) -> Result<(), ReverieCoreError> {
        let Some(object) = value.as_object() else {
            return Err(ReverieCoreError::Generation(
                "model returned a non-object value".to_string(),
            ));
        };
        for key in &self.required {
            if !object.contains_key(key) {
                return Err(ReverieCoreError::Generation(format!(
                    "generated object missing required key: {key}"
                )));
            }
        }
        Ok(())
    }
}

/// Black-box generation capability required by the runtime.
///
/// Retries and provider fallback beyond this contract are the
/// provider's concern, not the runtime's.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Generate free text from a prompt context.
    async fn generate_text(
        &self,
        context: &str,
        class: ModelClass,
    ) -> Result<String, ReverieCoreError>;

    /// Answer a boolean classification over a prompt context.
    async fn classify(&self, context: &str, class: ModelClass) -> Result<bool, ReverieCoreError>;

    /// Generate a structured object validated against a schema.
    async fn generate_object(
        &self,
        context: &str,
        class: ModelClass,
        schema: &ObjectSchema,
    ) -> Result<Value, ReverieCoreError>;
}
