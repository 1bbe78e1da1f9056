//! Documents and the chunks cut from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Where a document came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// The foundation's `Agent.md` system prompt
    AgentPrompt,
    /// A markdown page under `docs/`
    MarkdownDoc,
    /// One operation of an OpenAPI spec under `apis/`
    GeneratedApiMethod,
    Other,
}

/// A unit of ingested knowledge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub text: String,
    pub source_kind: SourceKind,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
}

impl Document {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        text: impl Into<String>,
        source_kind: SourceKind,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            text: text.into(),
            source_kind,
            metadata: BTreeMap::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A bounded slice of a document's text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    pub parent_doc_id: String,
    pub chunk_id: String,
    pub text: String,
    pub ordinal: usize,
}

impl Chunk {
    pub fn new(parent_doc_id: &str, ordinal: usize, text: impl Into<String>) -> Self {
        Self {
            parent_doc_id: parent_doc_id.to_string(),
            chunk_id: format!("{parent_doc_id}:{ordinal}"),
            text: text.into(),
            ordinal,
        }
    }
}
