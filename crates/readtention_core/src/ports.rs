//! crates/readtention_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::{Book, ConversationMessage, ConversationState, Insight, MindMap, Note};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// A versioned write lost a race with another writer.
    #[error("Conflicting update: {0}")]
    Conflict(String),
    /// The text-generation service failed, answered with an error status, or
    /// returned no usable completion.
    #[error("{0}")]
    Upstream(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Books ---
    async fn create_book(&self, title: &str, author: &str) -> PortResult<Book>;

    async fn list_books(&self) -> PortResult<Vec<Book>>;

    async fn get_book_by_id(&self, book_id: Uuid) -> PortResult<Book>;

    /// Deletes a book together with everything recorded about it.
    async fn delete_book(&self, book_id: Uuid) -> PortResult<()>;

    // --- Conversation ---
    async fn append_message(&self, message: ConversationMessage) -> PortResult<ConversationMessage>;

    /// Messages for a book, oldest first.
    async fn get_messages_for_book(&self, book_id: Uuid) -> PortResult<Vec<ConversationMessage>>;

    async fn delete_messages_for_book(&self, book_id: Uuid) -> PortResult<()>;

    async fn get_conversation_state(&self, book_id: Uuid) -> PortResult<Option<ConversationState>>;

    /// Saves a state snapshot if `state.version` matches the stored version
    /// (or no state exists and the version is 0). Returns the snapshot with
    /// its new version, or `PortError::Conflict` if another writer got there first.
    async fn save_conversation_state(&self, state: ConversationState) -> PortResult<ConversationState>;

    // --- Insights and Notes ---
    async fn save_insight(&self, insight: Insight) -> PortResult<()>;

    async fn get_insights_for_book(&self, book_id: Uuid) -> PortResult<Vec<Insight>>;

    async fn save_note(&self, note: Note) -> PortResult<()>;

    async fn get_notes_for_book(&self, book_id: Uuid) -> PortResult<Vec<Note>>;

    // --- Mind Maps ---
    async fn save_mindmap(&self, mindmap: MindMap) -> PortResult<()>;

    /// Mind maps for a book, newest first.
    async fn get_mindmaps_for_book(&self, book_id: Uuid) -> PortResult<Vec<MindMap>>;
}

/// The role attached to a message sent to the text-generation service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: ChatRole::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: ChatRole::User, content: content.into() }
    }
}

/// A single request/response completion call.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompletionRequest {
    pub messages: Vec<ChatTurn>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    pub fn new(messages: Vec<ChatTurn>) -> Self {
        Self { messages, ..Default::default() }
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

#[async_trait]
pub trait TextGenerationService: Send + Sync {
    /// Identifier of the model this service talks to, recorded alongside
    /// generated artifacts.
    fn model(&self) -> &str;

    /// Returns the completion text. Transport failures, error statuses and
    /// empty completions all surface as `PortError::Upstream`.
    async fn complete(&self, request: CompletionRequest) -> PortResult<String>;
}

/// Book metadata as returned by the catalogue search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookSummary {
    pub id: String,
    pub title: String,
    pub author: String,
    pub authors: Vec<String>,
    pub cover_url: Option<String>,
    pub cover_large: Option<String>,
    pub publish_year: Option<i32>,
    pub page_count: Option<u32>,
    pub subjects: Vec<String>,
    pub description: Option<String>,
    pub ratings: Ratings,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ratings {
    pub average: Option<f64>,
    pub count: Option<u64>,
}

/// Small, medium and large renderings of one cover image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverSet {
    pub small: String,
    pub medium: String,
    pub large: String,
}

/// A catalogue work looked up by its key, e.g. `/works/OL17930368W`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookDetails {
    pub title: String,
    pub description: Option<String>,
    pub subjects: Vec<String>,
    pub covers: Vec<CoverSet>,
    pub created: Option<String>,
    pub last_modified: Option<String>,
}

/// An edition looked up by ISBN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IsbnBook {
    pub title: String,
    pub authors: Vec<String>,
    pub publish_date: Option<String>,
    pub publishers: Vec<String>,
    pub page_count: Option<u32>,
    pub cover_url: Option<String>,
    pub cover_large: Option<String>,
    pub subjects: Vec<String>,
    pub description: Option<String>,
    pub url: Option<String>,
}

#[async_trait]
pub trait BookSearchService: Send + Sync {
    async fn search_books(&self, query: &str, limit: usize) -> PortResult<Vec<BookSummary>>;

    /// Popular books, optionally restricted to a subject.
    async fn trending_books(&self, subject: Option<&str>, limit: usize) -> PortResult<Vec<BookSummary>>;

    async fn books_by_author(&self, author: &str, limit: usize) -> PortResult<Vec<BookSummary>>;

    /// `None` when the work is unknown or the lookup failed.
    async fn book_details(&self, work_key: &str) -> PortResult<Option<BookDetails>>;

    /// `None` when no edition carries the ISBN or the lookup failed.
    async fn book_by_isbn(&self, isbn: &str) -> PortResult<Option<IsbnBook>>;
}
