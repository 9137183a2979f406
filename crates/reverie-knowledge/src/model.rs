//! Knowledge item model used by stores and the manager.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A unit of long-form knowledge: a whole document or one of its chunks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KnowledgeItem {
    /// Deterministic identifier derived from source path or content.
    pub id: Uuid,
    /// Agent that owns the item.
    pub agent_id: Uuid,
    /// Item content and linkage metadata.
    pub content: KnowledgeContent,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Content payload of a knowledge item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KnowledgeContent {
    /// Text content; raw for parents, normalized for chunks.
    pub text: String,
    /// Free-form linkage and provenance metadata.
    #[serde(default)]
    pub metadata: KnowledgeMetadata,
}

/// Metadata carried by every knowledge item and chunk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct KnowledgeMetadata {
    /// Source path or label for the item.
    #[serde(default)]
    pub source: Option<String>,
    /// Ingestion branch tag (md, txt, pdf, direct).
    #[serde(default)]
    pub kind: Option<String>,
    /// Shared across agents rather than agent-private.
    #[serde(default)]
    pub shared: bool,
    /// True on the parent item of a chunked document.
    #[serde(default)]
    pub is_main: bool,
    /// True on chunk items.
    #[serde(default)]
    pub is_chunk: bool,
    /// Parent item id for chunks.
    #[serde(default)]
    pub original_id: Option<Uuid>,
    /// Position of this chunk within the parent.
    #[serde(default)]
    pub chunk_index: Option<usize>,
    /// Hash of the normalized text, used for dedup.
    #[serde(default)]
    pub input_hash: Option<String>,
    /// Set when retrieval truncated an oversized parent.
    #[serde(default)]
    pub truncated: bool,
    /// Original character length recorded at truncation time.
    #[serde(default)]
    pub original_length: Option<usize>,
}

/// A retrieval result with its final (possibly reranked) score.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedKnowledge {
    /// The retrieved item or chunk.
    pub item: KnowledgeItem,
    /// Final relevance score.
    pub score: f32,
}

/// Source kind selecting the file ingestion branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Markdown document.
    Markdown,
    /// Plain text document.
    Text,
    /// Extracted PDF text.
    Pdf,
}

impl FileKind {
    /// Tag recorded in item metadata.
    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Markdown => "md",
            FileKind::Text => "txt",
            FileKind::Pdf => "pdf",
        }
    }

    /// Select the ingestion branch from a file extension.
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "md" => Some(FileKind::Markdown),
            "txt" => Some(FileKind::Text),
            "pdf" => Some(FileKind::Pdf),
            _ => None,
        }
    }
}

/// One entry in a batch ingestion request.
#[derive(Debug, Clone)]
pub enum BatchItem {
    /// A direct knowledge string.
    Direct {
        /// Knowledge text.
        text: String,
        /// Shared across agents.
        shared: bool,
    },
    /// A knowledge file addressed by relative path.
    File {
        /// Relative path under the knowledge root.
        path: String,
        /// File content (already extracted for pdf).
        content: String,
        /// Ingestion branch.
        kind: FileKind,
        /// Shared across agents.
        shared: bool,
    },
}
