//! Registries for actions, evaluators, and context providers.

use crate::compose::ComposedState;
use crate::error::ReverieCoreError;
use async_trait::async_trait;
use log::{debug, warn};
use parking_lot::RwLock;
use reverie_memory::Memory;
use std::collections::HashMap;
use std::sync::Arc;

/// Identity exposed by every registrable component.
pub trait Registered {
    /// Stable identifier used for exact lookup.
    fn name(&self) -> &str;

    /// Legacy aliases resolved through the alias table.
    fn aliases(&self) -> Vec<String> {
        Vec::new()
    }
}

/// A response-side action the agent can perform.
#[async_trait]
pub trait Action: Registered + Send + Sync {
    /// Whether the action applies to the current message and state.
    async fn validate(&self, message: &Memory, state: &ComposedState) -> bool;

    /// Perform the action after a response was delivered.
    async fn handle(&self, message: &Memory, state: &ComposedState)
    -> Result<(), ReverieCoreError>;
}

/// A post-turn evaluator run after responses are delivered.
#[async_trait]
pub trait Evaluator: Registered + Send + Sync {
    /// Whether the evaluator applies to the current message and state.
    async fn validate(&self, message: &Memory, state: &ComposedState) -> bool;

    /// Run the evaluation.
    async fn evaluate(&self, message: &Memory, state: &ComposedState)
    -> Result<(), ReverieCoreError>;
}

/// A context provider contributing text to composed state.
#[async_trait]
pub trait ContextProvider: Registered + Send + Sync {
    /// Whether the provider applies to the current message and state.
    async fn validate(&self, message: &Memory, state: &ComposedState) -> bool;

    /// Produce context text for the prompt.
    async fn provide(&self, message: &Memory, state: &ComposedState)
    -> Result<String, ReverieCoreError>;
}

/// Registry keyed by exact stable name, with an alias table built at
/// registration time.
pub struct Registry<T: Registered + ?Sized> {
    entries: RwLock<HashMap<String, Arc<T>>>,
    aliases: RwLock<HashMap<String, String>>,
}

impl<T: Registered + ?Sized> Registry<T> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            aliases: RwLock::new(HashMap::new()),
        }
    }

    /// Register a component under its name and aliases.
    pub fn register(&self, item: Arc<T>) {
        let name = normalize(item.name());
        debug!("registering component (name={})", name);
        let mut aliases = self.aliases.write();
        for alias in item.aliases() {
            let alias = normalize(&alias);
            if alias == name {
                continue;
            }
            if let Some(existing) = aliases.insert(alias.clone(), name.clone()) {
                warn!(
                    "alias remapped (alias={}, previous={}, now={})",
                    alias, existing, name
                );
            }
        }
        self.entries.write().insert(name, item);
    }

    /// Fetch a component by exact name, falling back to the alias table.
    pub fn get(&self, name: &str) -> Option<Arc<T>> {
        let key = normalize(name);
        let entries = self.entries.read();
        if let Some(item) = entries.get(&key) {
            return Some(item.clone());
        }
        let aliases = self.aliases.read();
        aliases.get(&key).and_then(|target| entries.get(target).cloned())
    }

    /// Return all registered components.
    pub fn all(&self) -> Vec<Arc<T>> {
        self.entries.read().values().cloned().collect()
    }

    /// List all registered component names.
    pub fn list(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }
}

impl<T: Registered + ?Sized> Default for Registry<T> {
    /// Create an empty registry.
    fn default() -> Self {
        Self::new()
    }
}

/// Canonical form for names and aliases.
fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::{Registered, Registry};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    struct Labeled {
        name: &'static str,
        aliases: Vec<String>,
    }

    impl Registered for Labeled {
        fn name(&self) -> &str {
            self.name
        }

        fn aliases(&self) -> Vec<String> {
            self.aliases.clone()
        }
    }

    #[test]
    fn exact_lookup_and_alias_table() {
        let registry: Registry<Labeled> = Registry::new();
        registry.register(Arc::new(Labeled {
            name: "continue",
            aliases: vec!["CONTINUE_CONVERSATION".to_string()],
        }));

        assert!(registry.get("CONTINUE").is_some());
        assert!(registry.get("continue_conversation").is_some());
        assert!(registry.get("continue_conv").is_none());

        let mut names = registry.list();
        names.sort();
        assert_eq!(names, vec!["continue"]);
    }

    #[test]
    fn substrings_do_not_resolve() {
        let registry: Registry<Labeled> = Registry::new();
        registry.register(Arc::new(Labeled {
            name: "ignore",
            aliases: Vec::new(),
        }));
        assert!(registry.get("ignore").is_some());
        assert!(registry.get("ign").is_none());
        assert!(registry.get("ignored").is_none());
    }
}
