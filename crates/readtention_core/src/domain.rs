//! crates/readtention_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! Persistence adapters convert their own row types into these.

use crate::stage::Stage;
use crate::tree::MindMapTree;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A book on the user's shelf.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Book {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
}

/// Who authored a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Ai,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Ai => "ai",
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(MessageRole::User),
            "ai" => Ok(MessageRole::Ai),
            other => Err(format!("unknown message role '{}'", other)),
        }
    }
}

/// Marks messages the UI renders specially.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Welcome,
    MindmapGenerated,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Welcome => "welcome",
            MessageKind::MindmapGenerated => "mindmap_generated",
        }
    }
}

impl FromStr for MessageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "welcome" => Ok(MessageKind::Welcome),
            "mindmap_generated" => Ok(MessageKind::MindmapGenerated),
            other => Err(format!("unknown message type '{}'", other)),
        }
    }
}

/// One entry in a book's append-only conversation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationMessage {
    pub id: Uuid,
    pub book_id: Uuid,
    pub role: MessageRole,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: Option<MessageKind>,
    pub created_at: DateTime<Utc>,
}

impl ConversationMessage {
    /// Builds a message stamped with a fresh id and the current time.
    pub fn new(book_id: Uuid, role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            book_id,
            role,
            content: content.into(),
            kind: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_kind(mut self, kind: MessageKind) -> Self {
        self.kind = Some(kind);
        self
    }
}

/// Themes, quotes and takeaways extracted from a single user message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insight {
    pub id: Uuid,
    pub book_id: Uuid,
    pub message_id: Uuid,
    pub themes: Vec<String>,
    pub quotes: Vec<String>,
    pub takeaways: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Free-form notes written in manual mode.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Note {
    pub id: Uuid,
    pub book_id: Uuid,
    pub themes: String,
    pub quotes: String,
    pub takeaways: String,
    pub created_at: DateTime<Utc>,
}

/// A generated mind map. Every generation event produces a new row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MindMap {
    pub id: Uuid,
    pub book_id: Uuid,
    pub content: String,
    pub generation_prompt: Option<String>,
    pub ai_model: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// The durable snapshot of a book's step-by-step mind-map conversation.
///
/// `version` is bumped on every save and checked by the store, so a stale
/// writer gets a conflict instead of silently clobbering a newer state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationState {
    pub book_id: Uuid,
    pub stage: Stage,
    pub tree: MindMapTree,
    pub branch_cursor: usize,
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

impl ConversationState {
    pub fn new(book_id: Uuid, stage: Stage) -> Self {
        Self {
            book_id,
            stage,
            tree: MindMapTree::default(),
            branch_cursor: 0,
            version: 0,
            updated_at: Utc::now(),
        }
    }
}
