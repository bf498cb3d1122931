pub mod conversation;
pub mod conversation_task;
pub mod generation;
pub mod mindmap_task;
pub mod protocol;
pub mod reflect_task;
pub mod rest;
pub mod state;

use axum::{
    routing::{get, post},
    Router,
};
use state::AppState;
use std::sync::Arc;

/// Builds the API router. CORS and the Swagger UI are layered on by the binary.
pub fn router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(rest::health_handler))
        .route("/books", get(rest::list_books_handler).post(rest::create_book_handler))
        .route("/books/{id}", get(rest::get_book_handler).delete(rest::delete_book_handler))
        .route("/books/{id}/notes", get(rest::list_notes_handler).post(rest::create_note_handler))
        .route("/books/{id}/insights", get(rest::list_insights_handler))
        .route("/books/{id}/mindmaps", get(generation::list_mindmaps_handler))
        .route("/books/{id}/mindmaps/latest", get(generation::latest_mindmap_handler))
        .route(
            "/books/{id}/mindmaps/from-conversation",
            post(generation::conversation_mindmap_handler),
        )
        .route("/books/{id}/conversation", get(conversation::get_conversation_handler))
        .route("/books/{id}/conversation/messages", post(conversation::send_message_handler))
        .route("/books/{id}/conversation/accept", post(conversation::accept_handler))
        .route("/books/{id}/conversation/decline", post(conversation::decline_handler))
        .route("/books/{id}/conversation/start-over", post(conversation::start_over_handler))
        .route("/generate-mindmap", post(generation::generate_mindmap_handler))
        .route("/reflect", post(generation::reflect_handler))
        .route("/extract-insights", post(generation::extract_insights_handler))
        .route("/search/books", get(rest::search_books_handler))
        .route("/search/trending", get(rest::trending_books_handler))
        .route("/search/works/{work_id}", get(rest::book_details_handler))
        .route("/search/isbn/{isbn}", get(rest::book_by_isbn_handler))
        .route("/lenses", get(rest::list_lenses_handler))
        .route("/presets", get(rest::list_presets_handler))
        .with_state(app_state)
}
