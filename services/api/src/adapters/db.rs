//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use readtention_core::domain::{
    Book, ConversationMessage, ConversationState, Insight, MessageKind, MessageRole, MindMap, Note,
};
use readtention_core::ports::{DatabaseService, PortError, PortResult};
use readtention_core::{MindMapTree, Stage};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct BookRecord {
    id: Uuid,
    title: String,
    author: String,
    created_at: DateTime<Utc>,
}
impl BookRecord {
    fn to_domain(self) -> Book {
        Book {
            id: self.id,
            title: self.title,
            author: self.author,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct MessageRecord {
    id: Uuid,
    book_id: Uuid,
    role: String,
    content: String,
    message_type: Option<String>,
    created_at: DateTime<Utc>,
}
impl MessageRecord {
    fn to_domain(self) -> PortResult<ConversationMessage> {
        let role = self.role.parse::<MessageRole>().map_err(PortError::Unexpected)?;
        let kind = self
            .message_type
            .map(|t| t.parse::<MessageKind>())
            .transpose()
            .map_err(PortError::Unexpected)?;
        Ok(ConversationMessage {
            id: self.id,
            book_id: self.book_id,
            role,
            content: self.content,
            kind,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct InsightRecord {
    id: Uuid,
    book_id: Uuid,
    message_id: Uuid,
    themes: Vec<String>,
    quotes: Vec<String>,
    takeaways: Vec<String>,
    created_at: DateTime<Utc>,
}
impl InsightRecord {
    fn to_domain(self) -> Insight {
        Insight {
            id: self.id,
            book_id: self.book_id,
            message_id: self.message_id,
            themes: self.themes,
            quotes: self.quotes,
            takeaways: self.takeaways,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct NoteRecord {
    id: Uuid,
    book_id: Uuid,
    themes: String,
    quotes: String,
    takeaways: String,
    created_at: DateTime<Utc>,
}
impl NoteRecord {
    fn to_domain(self) -> Note {
        Note {
            id: self.id,
            book_id: self.book_id,
            themes: self.themes,
            quotes: self.quotes,
            takeaways: self.takeaways,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct MindMapRecord {
    id: Uuid,
    book_id: Uuid,
    content: String,
    generation_prompt: Option<String>,
    ai_model: Option<String>,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
}
impl MindMapRecord {
    fn to_domain(self) -> MindMap {
        MindMap {
            id: self.id,
            book_id: self.book_id,
            content: self.content,
            generation_prompt: self.generation_prompt,
            ai_model: self.ai_model,
            metadata: self.metadata,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct ConversationStateRecord {
    book_id: Uuid,
    stage: String,
    tree: Json<MindMapTree>,
    branch_cursor: i32,
    version: i64,
    updated_at: DateTime<Utc>,
}
impl ConversationStateRecord {
    fn to_domain(self) -> PortResult<ConversationState> {
        let stage = self.stage.parse::<Stage>().map_err(PortError::Unexpected)?;
        Ok(ConversationState {
            book_id: self.book_id,
            stage,
            tree: self.tree.0,
            branch_cursor: self.branch_cursor.max(0) as usize,
            version: self.version,
            updated_at: self.updated_at,
        })
    }
}

const MESSAGE_COLUMNS: &str = "id, book_id, role, content, type AS message_type, created_at";
const STATE_COLUMNS: &str = "book_id, stage, tree, branch_cursor, version, updated_at";

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn create_book(&self, title: &str, author: &str) -> PortResult<Book> {
        let record = sqlx::query_as::<_, BookRecord>(
            "INSERT INTO books (id, title, author) VALUES ($1, $2, $3) RETURNING id, title, author, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(title)
        .bind(author)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn list_books(&self) -> PortResult<Vec<Book>> {
        let records = sqlx::query_as::<_, BookRecord>(
            "SELECT id, title, author, created_at FROM books ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_book_by_id(&self, book_id: Uuid) -> PortResult<Book> {
        let record = sqlx::query_as::<_, BookRecord>(
            "SELECT id, title, author, created_at FROM books WHERE id = $1",
        )
        .bind(book_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("Book {} not found", book_id)),
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn delete_book(&self, book_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(book_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Book {} not found", book_id)));
        }
        Ok(())
    }

    async fn append_message(&self, message: ConversationMessage) -> PortResult<ConversationMessage> {
        let sql = format!(
            "INSERT INTO messages (id, book_id, role, content, type, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            MESSAGE_COLUMNS
        );
        let record = sqlx::query_as::<_, MessageRecord>(&sql)
            .bind(message.id)
            .bind(message.book_id)
            .bind(message.role.as_str())
            .bind(&message.content)
            .bind(message.kind.map(|k| k.as_str()))
            .bind(message.created_at)
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?;
        record.to_domain()
    }

    async fn get_messages_for_book(&self, book_id: Uuid) -> PortResult<Vec<ConversationMessage>> {
        let sql = format!(
            "SELECT {} FROM messages WHERE book_id = $1 ORDER BY created_at ASC, seq ASC",
            MESSAGE_COLUMNS
        );
        let records = sqlx::query_as::<_, MessageRecord>(&sql)
            .bind(book_id)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn delete_messages_for_book(&self, book_id: Uuid) -> PortResult<()> {
        sqlx::query("DELETE FROM messages WHERE book_id = $1")
            .bind(book_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn get_conversation_state(&self, book_id: Uuid) -> PortResult<Option<ConversationState>> {
        let sql = format!("SELECT {} FROM conversation_states WHERE book_id = $1", STATE_COLUMNS);
        let record = sqlx::query_as::<_, ConversationStateRecord>(&sql)
            .bind(book_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?;
        record.map(|r| r.to_domain()).transpose()
    }

    async fn save_conversation_state(&self, state: ConversationState) -> PortResult<ConversationState> {
        let record = if state.version == 0 {
            let sql = format!(
                "INSERT INTO conversation_states (book_id, stage, tree, branch_cursor, version, updated_at) \
                 VALUES ($1, $2, $3, $4, 1, NOW()) ON CONFLICT (book_id) DO NOTHING RETURNING {}",
                STATE_COLUMNS
            );
            sqlx::query_as::<_, ConversationStateRecord>(&sql)
                .bind(state.book_id)
                .bind(state.stage.as_str())
                .bind(Json(&state.tree))
                .bind(state.branch_cursor as i32)
                .fetch_optional(&self.pool)
                .await
                .map_err(unexpected)?
        } else {
            let sql = format!(
                "UPDATE conversation_states \
                 SET stage = $2, tree = $3, branch_cursor = $4, version = version + 1, updated_at = NOW() \
                 WHERE book_id = $1 AND version = $5 RETURNING {}",
                STATE_COLUMNS
            );
            sqlx::query_as::<_, ConversationStateRecord>(&sql)
                .bind(state.book_id)
                .bind(state.stage.as_str())
                .bind(Json(&state.tree))
                .bind(state.branch_cursor as i32)
                .bind(state.version)
                .fetch_optional(&self.pool)
                .await
                .map_err(unexpected)?
        };

        match record {
            Some(record) => record.to_domain(),
            None => Err(PortError::Conflict(format!(
                "Conversation for book {} was updated concurrently (expected version {})",
                state.book_id, state.version
            ))),
        }
    }

    async fn save_insight(&self, insight: Insight) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO insights (id, book_id, message_id, themes, quotes, takeaways, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(insight.id)
        .bind(insight.book_id)
        .bind(insight.message_id)
        .bind(&insight.themes)
        .bind(&insight.quotes)
        .bind(&insight.takeaways)
        .bind(insight.created_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn get_insights_for_book(&self, book_id: Uuid) -> PortResult<Vec<Insight>> {
        let records = sqlx::query_as::<_, InsightRecord>(
            "SELECT id, book_id, message_id, themes, quotes, takeaways, created_at \
             FROM insights WHERE book_id = $1 ORDER BY created_at ASC",
        )
        .bind(book_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn save_note(&self, note: Note) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO notes (id, book_id, themes, quotes, takeaways, created_at) VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(note.id)
        .bind(note.book_id)
        .bind(&note.themes)
        .bind(&note.quotes)
        .bind(&note.takeaways)
        .bind(note.created_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn get_notes_for_book(&self, book_id: Uuid) -> PortResult<Vec<Note>> {
        let records = sqlx::query_as::<_, NoteRecord>(
            "SELECT id, book_id, themes, quotes, takeaways, created_at FROM notes WHERE book_id = $1 ORDER BY created_at ASC",
        )
        .bind(book_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn save_mindmap(&self, mindmap: MindMap) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO mindmaps (id, book_id, content, generation_prompt, ai_model, metadata, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(mindmap.id)
        .bind(mindmap.book_id)
        .bind(&mindmap.content)
        .bind(&mindmap.generation_prompt)
        .bind(&mindmap.ai_model)
        .bind(&mindmap.metadata)
        .bind(mindmap.created_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn get_mindmaps_for_book(&self, book_id: Uuid) -> PortResult<Vec<MindMap>> {
        let records = sqlx::query_as::<_, MindMapRecord>(
            "SELECT id, book_id, content, generation_prompt, ai_model, metadata, created_at \
             FROM mindmaps WHERE book_id = $1 ORDER BY created_at DESC",
        )
        .bind(book_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }
}
