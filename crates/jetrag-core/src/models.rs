//! Core data models used throughout JetRAG.
//!
//! These types represent the documents, chunks, retrieval hits and
//! conversation turns that flow through indexing and chat.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A source document produced by the document loader.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    /// Path of the document relative to the corpus root.
    pub source: String,
    pub title: Option<String>,
    pub content_type: String,
    pub body: String,
    pub modified_at: DateTime<Utc>,
}

/// A contiguous window of a document's body text.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    /// Source path of the parent document.
    pub source: String,
    pub chunk_index: i64,
    /// Character offset of the first character of `text` within the document body.
    pub start: usize,
    pub text: String,
    pub hash: String,
}

/// A chunk returned from the retriever together with its similarity score.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One message of the conversation transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
    pub at: DateTime<Utc>,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            at: Utc::now(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
            at: Utc::now(),
        }
    }
}
