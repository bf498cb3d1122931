//! In-memory stand-ins for the service ports, and helpers for driving the
//! router without a network.

#![allow(dead_code)]

use api_lib::{
    config::Config,
    web::{self, state::AppState},
};
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use readtention_core::{
    domain::{Book, ConversationMessage, ConversationState, Insight, MindMap, Note},
    ports::{
        BookDetails, BookSearchService, BookSummary, CompletionRequest, DatabaseService, IsbnBook, PortError,
        PortResult, Ratings, TextGenerationService,
    },
};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;
use uuid::Uuid;

//=========================================================================================
// Database
//=========================================================================================

#[derive(Default)]
struct Tables {
    books: Vec<Book>,
    messages: Vec<ConversationMessage>,
    states: HashMap<Uuid, ConversationState>,
    insights: Vec<Insight>,
    notes: Vec<Note>,
    mindmaps: Vec<MindMap>,
}

#[derive(Default)]
pub struct MemoryDb {
    pub(crate) tables: Mutex<Tables>,
    pub fail_mindmap_saves: bool,
    pub fail_insight_saves: bool,
    /// When set, another writer bumps the stored state just before the next
    /// save, so that save sees a stale version.
    pub concurrent_writer: AtomicBool,
}

impl MemoryDb {
    pub fn insert_book(&self, title: &str, author: &str) -> Book {
        let book = Book {
            id: Uuid::new_v4(),
            title: title.to_string(),
            author: author.to_string(),
            created_at: Utc::now(),
        };
        self.tables.lock().unwrap().books.push(book.clone());
        book
    }

    pub fn push_message(&self, message: ConversationMessage) {
        self.tables.lock().unwrap().messages.push(message);
    }

    pub fn messages(&self, book_id: Uuid) -> Vec<ConversationMessage> {
        let tables = self.tables.lock().unwrap();
        tables.messages.iter().filter(|m| m.book_id == book_id).cloned().collect()
    }

    pub fn mindmaps(&self, book_id: Uuid) -> Vec<MindMap> {
        let tables = self.tables.lock().unwrap();
        tables.mindmaps.iter().filter(|m| m.book_id == book_id).cloned().collect()
    }

    pub fn insights(&self, book_id: Uuid) -> Vec<Insight> {
        let tables = self.tables.lock().unwrap();
        tables.insights.iter().filter(|i| i.book_id == book_id).cloned().collect()
    }

    pub fn state(&self, book_id: Uuid) -> Option<ConversationState> {
        self.tables.lock().unwrap().states.get(&book_id).cloned()
    }

    pub fn race_next_state_save(&self) {
        self.concurrent_writer.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl DatabaseService for MemoryDb {
    async fn create_book(&self, title: &str, author: &str) -> PortResult<Book> {
        Ok(self.insert_book(title, author))
    }

    async fn list_books(&self) -> PortResult<Vec<Book>> {
        let mut books = self.tables.lock().unwrap().books.clone();
        books.reverse();
        Ok(books)
    }

    async fn get_book_by_id(&self, book_id: Uuid) -> PortResult<Book> {
        let tables = self.tables.lock().unwrap();
        tables
            .books
            .iter()
            .find(|b| b.id == book_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Book {} not found", book_id)))
    }

    async fn delete_book(&self, book_id: Uuid) -> PortResult<()> {
        let mut tables = self.tables.lock().unwrap();
        let before = tables.books.len();
        tables.books.retain(|b| b.id != book_id);
        if tables.books.len() == before {
            return Err(PortError::NotFound(format!("Book {} not found", book_id)));
        }
        tables.messages.retain(|m| m.book_id != book_id);
        tables.states.remove(&book_id);
        tables.insights.retain(|i| i.book_id != book_id);
        tables.notes.retain(|n| n.book_id != book_id);
        tables.mindmaps.retain(|m| m.book_id != book_id);
        Ok(())
    }

    async fn append_message(&self, message: ConversationMessage) -> PortResult<ConversationMessage> {
        self.tables.lock().unwrap().messages.push(message.clone());
        Ok(message)
    }

    async fn get_messages_for_book(&self, book_id: Uuid) -> PortResult<Vec<ConversationMessage>> {
        Ok(self.messages(book_id))
    }

    async fn delete_messages_for_book(&self, book_id: Uuid) -> PortResult<()> {
        self.tables.lock().unwrap().messages.retain(|m| m.book_id != book_id);
        Ok(())
    }

    async fn get_conversation_state(&self, book_id: Uuid) -> PortResult<Option<ConversationState>> {
        Ok(self.state(book_id))
    }

    async fn save_conversation_state(&self, mut state: ConversationState) -> PortResult<ConversationState> {
        let mut tables = self.tables.lock().unwrap();
        if self.concurrent_writer.swap(false, Ordering::SeqCst) {
            if let Some(stored) = tables.states.get_mut(&state.book_id) {
                stored.version += 1;
            }
        }
        let stored = tables.states.get(&state.book_id).map(|s| s.version);
        let current = stored.unwrap_or(0);
        if state.version != current {
            return Err(PortError::Conflict(format!(
                "expected version {}, found {}",
                state.version, current
            )));
        }
        state.version = current + 1;
        state.updated_at = Utc::now();
        tables.states.insert(state.book_id, state.clone());
        Ok(state)
    }

    async fn save_insight(&self, insight: Insight) -> PortResult<()> {
        if self.fail_insight_saves {
            return Err(PortError::Unexpected("insights table unavailable".to_string()));
        }
        self.tables.lock().unwrap().insights.push(insight);
        Ok(())
    }

    async fn get_insights_for_book(&self, book_id: Uuid) -> PortResult<Vec<Insight>> {
        Ok(self.insights(book_id))
    }

    async fn save_note(&self, note: Note) -> PortResult<()> {
        self.tables.lock().unwrap().notes.push(note);
        Ok(())
    }

    async fn get_notes_for_book(&self, book_id: Uuid) -> PortResult<Vec<Note>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.notes.iter().filter(|n| n.book_id == book_id).cloned().collect())
    }

    async fn save_mindmap(&self, mindmap: MindMap) -> PortResult<()> {
        if self.fail_mindmap_saves {
            return Err(PortError::Unexpected("mindmaps table unavailable".to_string()));
        }
        self.tables.lock().unwrap().mindmaps.push(mindmap);
        Ok(())
    }

    async fn get_mindmaps_for_book(&self, book_id: Uuid) -> PortResult<Vec<MindMap>> {
        let mut mindmaps = self.mindmaps(book_id);
        mindmaps.reverse();
        Ok(mindmaps)
    }
}

//=========================================================================================
// Text Generation
//=========================================================================================

/// Answers each completion with the next scripted reply. Once the script runs
/// out every call fails as if the service were down.
pub struct ScriptedLlm {
    model: String,
    replies: Mutex<VecDeque<PortResult<String>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedLlm {
    pub fn new(model: &str) -> Self {
        Self {
            model: model.to_string(),
            replies: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn reply(self, text: &str) -> Self {
        self.replies.lock().unwrap().push_back(Ok(text.to_string()));
        self
    }

    pub fn fail(self, message: &str) -> Self {
        self.replies
            .lock()
            .unwrap()
            .push_back(Err(PortError::Upstream(message.to_string())));
        self
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerationService for ScriptedLlm {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> PortResult<String> {
        self.requests.lock().unwrap().push(request);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(PortError::Upstream("service unavailable".to_string())))
    }
}

//=========================================================================================
// Book Search
//=========================================================================================

pub struct CannedSearch;

pub fn summary(title: &str, author: &str) -> BookSummary {
    BookSummary {
        id: format!("/works/{}", title.replace(' ', "")),
        title: title.to_string(),
        author: author.to_string(),
        authors: vec![author.to_string()],
        cover_url: None,
        cover_large: None,
        publish_year: Some(2018),
        page_count: None,
        subjects: vec![],
        description: None,
        ratings: Ratings::default(),
    }
}

#[async_trait]
impl BookSearchService for CannedSearch {
    async fn search_books(&self, query: &str, limit: usize) -> PortResult<Vec<BookSummary>> {
        Ok(vec![summary(query, "James Clear")].into_iter().take(limit).collect())
    }

    async fn trending_books(&self, subject: Option<&str>, limit: usize) -> PortResult<Vec<BookSummary>> {
        let title = subject.unwrap_or("Dune");
        Ok(vec![summary(title, "Frank Herbert"), summary("Sapiens", "Yuval Noah Harari")]
            .into_iter()
            .take(limit)
            .collect())
    }

    async fn books_by_author(&self, author: &str, limit: usize) -> PortResult<Vec<BookSummary>> {
        Ok(vec![summary("Atomic Habits", author)].into_iter().take(limit).collect())
    }

    async fn book_details(&self, work_key: &str) -> PortResult<Option<BookDetails>> {
        Ok((work_key == "/works/OL17930368W").then(|| BookDetails {
            title: "Atomic Habits".to_string(),
            description: Some("Tiny changes, remarkable results.".to_string()),
            subjects: vec!["Habit".to_string()],
            covers: vec![],
            created: None,
            last_modified: None,
        }))
    }

    async fn book_by_isbn(&self, isbn: &str) -> PortResult<Option<IsbnBook>> {
        Ok((isbn == "9780735211292").then(|| IsbnBook {
            title: "Atomic Habits".to_string(),
            authors: vec!["James Clear".to_string()],
            publish_date: Some("2018".to_string()),
            publishers: vec!["Avery".to_string()],
            page_count: Some(320),
            cover_url: None,
            cover_large: None,
            subjects: vec![],
            description: None,
            url: None,
        }))
    }
}

//=========================================================================================
// Harness
//=========================================================================================

pub struct TestApp {
    pub router: Router,
    pub db: Arc<MemoryDb>,
    pub mindmap_llm: Arc<ScriptedLlm>,
    pub reflect_llm: Arc<ScriptedLlm>,
    pub insight_llm: Arc<ScriptedLlm>,
}

pub fn test_config() -> Config {
    Config::from_lookup(|key| match key {
        "DATABASE_URL" => Some("postgres://localhost/readtention_test".to_string()),
        _ => None,
    })
    .unwrap()
}

impl TestApp {
    pub fn new(db: MemoryDb, mindmap_llm: ScriptedLlm, reflect_llm: ScriptedLlm, insight_llm: ScriptedLlm) -> Self {
        let db = Arc::new(db);
        let mindmap_llm = Arc::new(mindmap_llm);
        let reflect_llm = Arc::new(reflect_llm);
        let insight_llm = Arc::new(insight_llm);
        let state = Arc::new(AppState {
            db: db.clone(),
            config: Arc::new(test_config()),
            mindmap_llm: mindmap_llm.clone(),
            reflect_llm: reflect_llm.clone(),
            insight_llm: insight_llm.clone(),
            book_search: Arc::new(CannedSearch),
        });
        Self {
            router: web::router(state),
            db,
            mindmap_llm,
            reflect_llm,
            insight_llm,
        }
    }

    /// An app whose models have nothing scripted.
    pub fn idle() -> Self {
        Self::new(
            MemoryDb::default(),
            ScriptedLlm::new("gpt-4"),
            ScriptedLlm::new("gpt-4o-mini"),
            ScriptedLlm::new("gpt-4o-mini"),
        )
    }

    pub async fn call(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.call(Method::GET, uri, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.call(Method::POST, uri, Some(body)).await
    }
}
