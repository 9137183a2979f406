//! Configuration schema for the reverie runtime.

use serde::{Deserialize, Serialize};

/// Root config for the reverie runtime.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ReverieConfig {
    #[serde(default, rename = "$schema")]
    pub schema: Option<String>,
    #[serde(default)]
    pub memory: MemorySettings,
    #[serde(default)]
    pub knowledge: KnowledgeSettings,
    #[serde(default)]
    pub queue: QueueSettings,
    #[serde(default)]
    pub composition: CompositionSettings,
    #[serde(default)]
    pub interest: InterestSettings,
}

impl ReverieConfig {
    /// Start building a config programmatically with defaults applied.
    pub fn builder() -> ReverieConfigBuilder {
        ReverieConfigBuilder::new()
    }
}

/// Builder for assembling a `ReverieConfig` in code.
#[derive(Debug, Default, Clone)]
pub struct ReverieConfigBuilder {
    config: ReverieConfig,
}

impl ReverieConfigBuilder {
    /// Create a new builder seeded with default config values.
    pub fn new() -> Self {
        Self {
            config: ReverieConfig::default(),
        }
    }

    /// Replace the memory settings.
    pub fn memory(mut self, memory: MemorySettings) -> Self {
        self.config.memory = memory;
        self
    }

    /// Replace the knowledge settings.
    pub fn knowledge(mut self, knowledge: KnowledgeSettings) -> Self {
        self.config.knowledge = knowledge;
        self
    }

    /// Replace the request queue settings.
    pub fn queue(mut self, queue: QueueSettings) -> Self {
        self.config.queue = queue;
        self
    }

    /// Replace the state composition settings.
    pub fn composition(mut self, composition: CompositionSettings) -> Self {
        self.config.composition = composition;
        self
    }

    /// Replace the interest tracking settings.
    pub fn interest(mut self, interest: InterestSettings) -> Self {
        self.config.interest = interest;
        self
    }

    /// Finalize and return the built `ReverieConfig`.
    pub fn build(self) -> ReverieConfig {
        self.config
    }
}

/// Settings for conversational memory storage and retrieval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemorySettings {
    /// Root path for the file-backed memory store.
    #[serde(default)]
    pub path: Option<String>,
    /// Default number of memories returned per room query.
    #[serde(default = "default_retrieval_count")]
    pub retrieval_count: usize,
    /// Table name recorded on memory vector metadata.
    #[serde(default = "default_memory_table")]
    pub table: String,
}

impl Default for MemorySettings {
    /// Default memory settings.
    fn default() -> Self {
        Self {
            path: None,
            retrieval_count: default_retrieval_count(),
            table: default_memory_table(),
        }
    }
}

fn default_retrieval_count() -> usize {
    10
}

fn default_memory_table() -> String {
    "messages".to_string()
}

/// Settings for knowledge ingestion and retrieval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeSettings {
    /// Root path for the file-backed knowledge store.
    #[serde(default)]
    pub path: Option<String>,
    /// Minimum similarity score for retrieval results.
    #[serde(default = "default_match_threshold")]
    pub match_threshold: f32,
    /// Chunk size in whitespace tokens.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Overlap between adjacent chunks in tokens.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    /// Default number of knowledge items returned per query.
    #[serde(default = "default_knowledge_limit")]
    pub default_limit: usize,
}

impl Default for KnowledgeSettings {
    /// Default knowledge settings.
    fn default() -> Self {
        Self {
            path: None,
            match_threshold: default_match_threshold(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            default_limit: default_knowledge_limit(),
        }
    }
}

fn default_match_threshold() -> f32 {
    0.85
}

fn default_chunk_size() -> usize {
    512
}

fn default_chunk_overlap() -> usize {
    20
}

fn default_knowledge_limit() -> usize {
    5
}

/// Settings for the outbound request queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueSettings {
    /// Hard per-task timeout in seconds.
    #[serde(default = "default_task_timeout_secs")]
    pub task_timeout_secs: u64,
    /// Maximum attempts per task before surfacing the last error.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Ceiling on exponential backoff in seconds.
    #[serde(default = "default_backoff_cap_secs")]
    pub backoff_cap_secs: u64,
    /// Lower bound for inter-task jitter in milliseconds.
    #[serde(default = "default_jitter_min_ms")]
    pub jitter_min_ms: u64,
    /// Upper bound for inter-task jitter in milliseconds.
    #[serde(default = "default_jitter_max_ms")]
    pub jitter_max_ms: u64,
}

impl Default for QueueSettings {
    /// Default queue settings.
    fn default() -> Self {
        Self {
            task_timeout_secs: default_task_timeout_secs(),
            max_attempts: default_max_attempts(),
            backoff_cap_secs: default_backoff_cap_secs(),
            jitter_min_ms: default_jitter_min_ms(),
            jitter_max_ms: default_jitter_max_ms(),
        }
    }
}

fn default_task_timeout_secs() -> u64 {
    45
}

fn default_max_attempts() -> u32 {
    5
}

fn default_backoff_cap_secs() -> u64 {
    64
}

fn default_jitter_min_ms() -> u64 {
    1500
}

fn default_jitter_max_ms() -> u64 {
    3000
}

/// Settings for prompt state composition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositionSettings {
    /// Number of recent messages included in composed state.
    #[serde(default = "default_conversation_length")]
    pub conversation_length: usize,
    /// Number of recent cross-room interactions included.
    #[serde(default = "default_recent_interactions")]
    pub recent_interactions: usize,
    /// Attachment freshness window in minutes.
    #[serde(default = "default_attachment_window_mins")]
    pub attachment_window_mins: i64,
}

impl Default for CompositionSettings {
    /// Default composition settings.
    fn default() -> Self {
        Self {
            conversation_length: default_conversation_length(),
            recent_interactions: default_recent_interactions(),
            attachment_window_mins: default_attachment_window_mins(),
        }
    }
}

fn default_conversation_length() -> usize {
    32
}

fn default_recent_interactions() -> usize {
    20
}

fn default_attachment_window_mins() -> i64 {
    60
}

/// Settings for per-room engagement tracking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterestSettings {
    /// Maximum recent messages kept per tracked room.
    #[serde(default = "default_interest_messages")]
    pub max_messages: usize,
    /// Similarity threshold for previous-context comparisons.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
}

impl Default for InterestSettings {
    /// Default interest settings.
    fn default() -> Self {
        Self {
            max_messages: default_interest_messages(),
            similarity_threshold: default_similarity_threshold(),
        }
    }
}

fn default_interest_messages() -> usize {
    20
}

fn default_similarity_threshold() -> f32 {
    0.7
}

#[cfg(test)]
mod tests {
    use super::ReverieConfig;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_apply_to_empty_config() {
        let config = ReverieConfig::default();
        assert_eq!(config.memory.retrieval_count, 10);
        assert_eq!(config.knowledge.match_threshold, 0.85);
        assert_eq!(config.knowledge.chunk_size, 512);
        assert_eq!(config.queue.task_timeout_secs, 45);
        assert_eq!(config.composition.conversation_length, 32);
    }

    #[test]
    fn builder_overrides_sections() {
        let config = ReverieConfig::builder()
            .knowledge(super::KnowledgeSettings {
                match_threshold: 0.5,
                ..Default::default()
            })
            .build();
        assert_eq!(config.knowledge.match_threshold, 0.5);
        assert_eq!(config.memory.retrieval_count, 10);
    }
}
