use async_trait::async_trait;
use reverie_core::{LanguageModel, ModelClass, ObjectSchema, ReverieCoreError};
use serde_json::{Value, json};

/// Language model stub returning a fixed response.
#[derive(Clone)]
pub struct FixedLanguageModel {
    text: String,
    action: Option<String>,
    decision: bool,
}

impl FixedLanguageModel {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            action: None,
            decision: true,
        }
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn with_decision(mut self, decision: bool) -> Self {
        self.decision = decision;
        self
    }
}

#[async_trait]
impl LanguageModel for FixedLanguageModel {
    async fn generate_text(
        &self,
        _context: &str,
        _class: ModelClass,
    ) -> Result<String, ReverieCoreError> {
        Ok(self.text.clone())
    }

    async fn classify(
        &self,
        _context: &str,
        _class: ModelClass,
    ) -> Result<bool, ReverieCoreError> {
        Ok(self.decision)
    }

    async fn generate_object(
        &self,
        _context: &str,
        _class: ModelClass,
        _schema: &ObjectSchema,
    ) -> Result<Value, ReverieCoreError> {
        Ok(json!({ "text": self.text, "action": self.action }))
    }
}

/// Language model stub that always fails.
pub struct FailingLanguageModel;

#[async_trait]
impl LanguageModel for FailingLanguageModel {
    async fn generate_text(
        &self,
        _context: &str,
        _class: ModelClass,
    ) -> Result<String, ReverieCoreError> {
        Err(ReverieCoreError::Generation("model unavailable".to_string()))
    }

    async fn classify(
        &self,
        _context: &str,
        _class: ModelClass,
    ) -> Result<bool, ReverieCoreError> {
        Err(ReverieCoreError::Generation("model unavailable".to_string()))
    }

    async fn generate_object(
        &self,
        _context: &str,
        _class: ModelClass,
        _schema: &ObjectSchema,
    ) -> Result<Value, ReverieCoreError> {
        Err(ReverieCoreError::Generation("model unavailable".to_string()))
    }
}
