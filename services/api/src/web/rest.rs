//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the bookshelf, notes, catalogue search and
//! lens catalogue endpoints, and the master definition for the OpenAPI
//! specification.

use crate::{
    error::ApiError,
    web::{
        conversation, generation,
        protocol::{
            required_text, AcceptRequest, BookResponse, ConversationResponse, CreateBookRequest,
            CreateNoteRequest, ExtractInsightsRequest, ExtractInsightsResponse, GenerateMindmapRequest,
            GenerateMindmapResponse, InsightResponse, LensData, LensResponse, MessageResponse,
            MindMapResponse, NoteResponse, PresetResponse, ReflectRequest, ReflectResponse,
            SearchParams, SendMessageRequest, TrendingParams, TurnResponse,
        },
        state::AppState,
    },
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::Utc;
use readtention_core::{
    domain::{Book, Note},
    lens::{lens_table, PRESETS},
    ports::{BookDetails, BookSummary, IsbnBook, PortError},
};
use serde_json::json;
use std::sync::Arc;
use tracing::info;
use utoipa::OpenApi;
use uuid::Uuid;

const DEFAULT_SEARCH_LIMIT: usize = 20;
const MAX_SEARCH_LIMIT: usize = 100;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        health_handler,
        list_books_handler,
        create_book_handler,
        get_book_handler,
        delete_book_handler,
        list_notes_handler,
        create_note_handler,
        list_insights_handler,
        search_books_handler,
        trending_books_handler,
        book_details_handler,
        book_by_isbn_handler,
        list_lenses_handler,
        list_presets_handler,
        generation::generate_mindmap_handler,
        generation::reflect_handler,
        generation::extract_insights_handler,
        generation::list_mindmaps_handler,
        generation::latest_mindmap_handler,
        generation::conversation_mindmap_handler,
        conversation::get_conversation_handler,
        conversation::send_message_handler,
        conversation::accept_handler,
        conversation::decline_handler,
        conversation::start_over_handler,
    ),
    components(
        schemas(
            AcceptRequest, BookResponse, ConversationResponse, CreateBookRequest, CreateNoteRequest,
            ExtractInsightsRequest, ExtractInsightsResponse, GenerateMindmapRequest,
            GenerateMindmapResponse, InsightResponse, LensData, LensResponse, MessageResponse,
            MindMapResponse, NoteResponse, PresetResponse, ReflectRequest, ReflectResponse,
            SendMessageRequest, TurnResponse
        )
    ),
    tags(
        (name = "Readtention API", description = "Bookshelf, Socratic reflection and mind-map endpoints.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Shared Helpers
//=========================================================================================

/// Loads a book, mapping a missing row to a 404 `Book not found`.
pub(crate) async fn find_book(app_state: &Arc<AppState>, book_id: Uuid) -> Result<Book, ApiError> {
    match app_state.db.get_book_by_id(book_id).await {
        Ok(book) => Ok(book),
        Err(PortError::NotFound(_)) => Err(ApiError::NotFound("Book not found".to_string())),
        Err(e) => Err(e.into()),
    }
}

fn search_limit(limit: Option<usize>) -> usize {
    limit.unwrap_or(DEFAULT_SEARCH_LIMIT).clamp(1, MAX_SEARCH_LIMIT)
}

/// Strips hyphens and spaces, then accepts ISBN-10 (optionally ending in `X`)
/// or ISBN-13.
fn normalize_isbn(raw: &str) -> Option<String> {
    let isbn: String = raw.chars().filter(|c| *c != '-' && !c.is_whitespace()).collect();
    if !isbn.is_ascii() {
        return None;
    }
    let valid = match isbn.len() {
        10 => {
            isbn[..9].chars().all(|c| c.is_ascii_digit())
                && isbn[9..].chars().all(|c| c.is_ascii_digit() || c == 'X' || c == 'x')
        }
        13 => isbn.chars().all(|c| c.is_ascii_digit()),
        _ => false,
    };
    valid.then(|| isbn.to_uppercase())
}

//=========================================================================================
// Health
//=========================================================================================

#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "The service is up"))
)]
pub async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok", "timestamp": Utc::now().to_rfc3339() }))
}

//=========================================================================================
// Books
//=========================================================================================

#[utoipa::path(
    get,
    path = "/books",
    responses((status = 200, description = "All books, newest first", body = [BookResponse]))
)]
pub async fn list_books_handler(State(app_state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let books = app_state.db.list_books().await?;
    Ok(Json(books.into_iter().map(BookResponse::from).collect::<Vec<_>>()))
}

/// Add a book to the shelf.
#[utoipa::path(
    post,
    path = "/books",
    request_body = CreateBookRequest,
    responses(
        (status = 201, description = "Book created", body = BookResponse),
        (status = 400, description = "Missing title")
    )
)]
pub async fn create_book_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<CreateBookRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let title = required_text(payload.title, "Missing title")?;
    let author = payload
        .author
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty())
        .unwrap_or_else(|| "Unknown Author".to_string());

    let book = app_state.db.create_book(&title, &author).await?;
    info!("Created book {} ('{}')", book.id, book.title);
    Ok((StatusCode::CREATED, Json(BookResponse::from(book))))
}

#[utoipa::path(
    get,
    path = "/books/{id}",
    params(("id" = Uuid, Path, description = "The book id.")),
    responses(
        (status = 200, description = "The book", body = BookResponse),
        (status = 404, description = "Book not found")
    )
)]
pub async fn get_book_handler(
    State(app_state): State<Arc<AppState>>,
    Path(book_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let book = find_book(&app_state, book_id).await?;
    Ok(Json(BookResponse::from(book)))
}

/// Delete a book and everything recorded about it.
#[utoipa::path(
    delete,
    path = "/books/{id}",
    params(("id" = Uuid, Path, description = "The book id.")),
    responses(
        (status = 204, description = "Book deleted"),
        (status = 404, description = "Book not found")
    )
)]
pub async fn delete_book_handler(
    State(app_state): State<Arc<AppState>>,
    Path(book_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    match app_state.db.delete_book(book_id).await {
        Ok(()) => {
            info!("Deleted book {}", book_id);
            Ok(StatusCode::NO_CONTENT)
        }
        Err(PortError::NotFound(_)) => Err(ApiError::NotFound("Book not found".to_string())),
        Err(e) => Err(e.into()),
    }
}

//=========================================================================================
// Notes and Insights
//=========================================================================================

#[utoipa::path(
    get,
    path = "/books/{id}/notes",
    params(("id" = Uuid, Path, description = "The book id.")),
    responses((status = 200, description = "Notes for the book", body = [NoteResponse]))
)]
pub async fn list_notes_handler(
    State(app_state): State<Arc<AppState>>,
    Path(book_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let book = find_book(&app_state, book_id).await?;
    let notes = app_state.db.get_notes_for_book(book.id).await?;
    Ok(Json(notes.into_iter().map(NoteResponse::from).collect::<Vec<_>>()))
}

/// Save notes written by hand.
#[utoipa::path(
    post,
    path = "/books/{id}/notes",
    params(("id" = Uuid, Path, description = "The book id.")),
    request_body = CreateNoteRequest,
    responses(
        (status = 201, description = "Note saved", body = NoteResponse),
        (status = 400, description = "All fields empty"),
        (status = 404, description = "Book not found")
    )
)]
pub async fn create_note_handler(
    State(app_state): State<Arc<AppState>>,
    Path(book_id): Path<Uuid>,
    Json(payload): Json<CreateNoteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let book = find_book(&app_state, book_id).await?;
    let (themes, quotes, takeaways) = (
        payload.themes.trim().to_string(),
        payload.quotes.trim().to_string(),
        payload.takeaways.trim().to_string(),
    );
    if themes.is_empty() && quotes.is_empty() && takeaways.is_empty() {
        return Err(ApiError::MissingInput("Note is empty".to_string()));
    }

    let note = Note {
        id: Uuid::new_v4(),
        book_id: book.id,
        themes,
        quotes,
        takeaways,
        created_at: Utc::now(),
    };
    app_state.db.save_note(note.clone()).await?;
    Ok((StatusCode::CREATED, Json(NoteResponse::from(note))))
}

#[utoipa::path(
    get,
    path = "/books/{id}/insights",
    params(("id" = Uuid, Path, description = "The book id.")),
    responses((status = 200, description = "Insights extracted for the book", body = [InsightResponse]))
)]
pub async fn list_insights_handler(
    State(app_state): State<Arc<AppState>>,
    Path(book_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let book = find_book(&app_state, book_id).await?;
    let insights = app_state.db.get_insights_for_book(book.id).await?;
    Ok(Json(insights.into_iter().map(InsightResponse::from).collect::<Vec<_>>()))
}

//=========================================================================================
// Catalogue Search
//=========================================================================================

/// Search the catalogue by title, author or ISBN.
///
/// `author` narrows the search to works by that author and takes precedence over `q`.
#[utoipa::path(
    get,
    path = "/search/books",
    params(
        ("q" = Option<String>, Query, description = "Free-text query."),
        ("author" = Option<String>, Query, description = "Author name."),
        ("limit" = Option<usize>, Query, description = "Maximum results (default 20).")
    ),
    responses(
        (status = 200, description = "Matching books"),
        (status = 400, description = "Missing query")
    )
)]
pub async fn search_books_handler(
    State(app_state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<BookSummary>>, ApiError> {
    let limit = search_limit(params.limit);
    if let Some(author) = params.author.map(|a| a.trim().to_string()).filter(|a| !a.is_empty()) {
        return Ok(Json(app_state.book_search.books_by_author(&author, limit).await?));
    }
    let query = required_text(params.q, "Missing search query")?;
    Ok(Json(app_state.book_search.search_books(&query, limit).await?))
}

#[utoipa::path(
    get,
    path = "/search/trending",
    params(
        ("subject" = Option<String>, Query, description = "Restrict to a subject."),
        ("limit" = Option<usize>, Query, description = "Maximum results (default 20).")
    ),
    responses((status = 200, description = "Popular books"))
)]
pub async fn trending_books_handler(
    State(app_state): State<Arc<AppState>>,
    Query(params): Query<TrendingParams>,
) -> Result<Json<Vec<BookSummary>>, ApiError> {
    let limit = search_limit(params.limit);
    let books = app_state
        .book_search
        .trending_books(params.subject.as_deref(), limit)
        .await?;
    Ok(Json(books))
}

/// Look up a catalogue work by its Open Library id, e.g. `OL17930368W`.
#[utoipa::path(
    get,
    path = "/search/works/{work_id}",
    params(("work_id" = String, Path, description = "The Open Library work id.")),
    responses(
        (status = 200, description = "The work"),
        (status = 400, description = "Malformed work id"),
        (status = 404, description = "Work not found")
    )
)]
pub async fn book_details_handler(
    State(app_state): State<Arc<AppState>>,
    Path(work_id): Path<String>,
) -> Result<Json<BookDetails>, ApiError> {
    if work_id.is_empty() || !work_id.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ApiError::MissingInput("Invalid work id".to_string()));
    }
    app_state
        .book_search
        .book_details(&format!("/works/{}", work_id))
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Work not found".to_string()))
}

#[utoipa::path(
    get,
    path = "/search/isbn/{isbn}",
    params(("isbn" = String, Path, description = "ISBN-10 or ISBN-13, hyphens allowed.")),
    responses(
        (status = 200, description = "The edition"),
        (status = 400, description = "Malformed ISBN"),
        (status = 404, description = "No edition with this ISBN")
    )
)]
pub async fn book_by_isbn_handler(
    State(app_state): State<Arc<AppState>>,
    Path(isbn): Path<String>,
) -> Result<Json<IsbnBook>, ApiError> {
    let isbn = normalize_isbn(&isbn).ok_or_else(|| ApiError::MissingInput("Invalid ISBN".to_string()))?;
    app_state
        .book_search
        .book_by_isbn(&isbn)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("No book found for this ISBN".to_string()))
}

//=========================================================================================
// Lens Catalogue
//=========================================================================================

#[utoipa::path(
    get,
    path = "/lenses",
    responses((status = 200, description = "The reading lenses", body = [LensResponse]))
)]
pub async fn list_lenses_handler() -> Json<Vec<LensResponse>> {
    Json(lens_table().iter().map(LensResponse::from).collect())
}

#[utoipa::path(
    get,
    path = "/presets",
    responses((status = 200, description = "The lens presets", body = [PresetResponse]))
)]
pub async fn list_presets_handler() -> Json<Vec<PresetResponse>> {
    Json(PRESETS.iter().map(PresetResponse::from).collect())
}
