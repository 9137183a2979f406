//! Config file loading and validation.

use crate::{ConfigError, ReverieConfig};
use log::{debug, info};
use serde_json::Value;
use std::fs;
use std::path::Path;

impl ReverieConfig {
    /// Load a config from a JSON5 file on disk.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        info!("loading config from path: {}", path.as_ref().display());
        let contents = fs::read_to_string(path)?;
        Self::load_from_str(&contents)
    }

    /// Load a config from JSON5 contents.
    pub fn load_from_str(contents: &str) -> Result<Self, ConfigError> {
        debug!("loading config from raw contents (len={})", contents.len());
        let value: Value = json5::from_str(contents)?;
        let config: ReverieConfig = serde_json::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration invariants that cannot be expressed in serde.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.knowledge.match_threshold) {
            return Err(ConfigError::InvalidField {
                path: "knowledge.match_threshold".to_string(),
                message: "must be within [0.0, 1.0]".to_string(),
            });
        }
        if self.knowledge.chunk_size == 0 {
            return Err(ConfigError::InvalidField {
                path: "knowledge.chunk_size".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.knowledge.chunk_overlap >= self.knowledge.chunk_size {
            return Err(ConfigError::InvalidField {
                path: "knowledge.chunk_overlap".to_string(),
                message: "must be smaller than chunk_size".to_string(),
            });
        }
        if self.queue.task_timeout_secs == 0 {
            return Err(ConfigError::InvalidField {
                path: "queue.task_timeout_secs".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.queue.max_attempts == 0 {
            return Err(ConfigError::InvalidField {
                path: "queue.max_attempts".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.queue.jitter_min_ms > self.queue.jitter_max_ms {
            return Err(ConfigError::InvalidField {
                path: "queue.jitter_min_ms".to_string(),
                message: "must not exceed jitter_max_ms".to_string(),
            });
        }
        if self.composition.conversation_length == 0 {
            return Err(ConfigError::InvalidField {
                path: "composition.conversation_length".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{ConfigError, ReverieConfig};
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn loads_json5_with_comments_and_defaults() {
        let contents = r#"{
            // retrieval tuning
            knowledge: { match_threshold: 0.9, chunk_size: 256 },
            queue: { task_timeout_secs: 30 },
        }"#;
        let config = ReverieConfig::load_from_str(contents).expect("load");
        assert_eq!(config.knowledge.match_threshold, 0.9);
        assert_eq!(config.knowledge.chunk_size, 256);
        assert_eq!(config.queue.task_timeout_secs, 30);
        assert_eq!(config.memory.retrieval_count, 10);
    }

    #[test]
    fn loads_from_file_path() {
        let mut file = NamedTempFile::new().expect("tempfile");
        write!(file, "{{ composition: {{ conversation_length: 8 }} }}").expect("write");
        let config = ReverieConfig::load_from_path(file.path()).expect("load");
        assert_eq!(config.composition.conversation_length, 8);
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        let contents = r#"{ knowledge: { match_threshold: 1.5 } }"#;
        let err = ReverieConfig::load_from_str(contents).expect_err("must fail");
        match err {
            ConfigError::InvalidField { path, .. } => {
                assert_eq!(path, "knowledge.match_threshold");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_overlap_larger_than_chunk() {
        let contents = r#"{ knowledge: { chunk_size: 16, chunk_overlap: 32 } }"#;
        let err = ReverieConfig::load_from_str(contents).expect_err("must fail");
        assert!(matches!(err, ConfigError::InvalidField { .. }));
    }
}
