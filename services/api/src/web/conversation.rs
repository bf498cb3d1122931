//! services/api/src/web/conversation.rs
//!
//! Axum handlers for a book's step-by-step mind-map conversation.

use crate::{
    error::ApiError,
    web::{
        conversation_task,
        protocol::{required_text, AcceptRequest, ConversationResponse, SendMessageRequest, TurnResponse},
        rest::find_book,
        state::AppState,
    },
};
use axum::{
    extract::{Path, State},
    response::Json,
};
use std::sync::Arc;
use uuid::Uuid;

/// Fetch the conversation, starting it with a welcome message on first visit.
#[utoipa::path(
    get,
    path = "/books/{id}/conversation",
    params(("id" = Uuid, Path, description = "The book id.")),
    responses(
        (status = 200, description = "The conversation", body = ConversationResponse),
        (status = 404, description = "Book not found")
    )
)]
pub async fn get_conversation_handler(
    State(app_state): State<Arc<AppState>>,
    Path(book_id): Path<Uuid>,
) -> Result<Json<ConversationResponse>, ApiError> {
    let book = find_book(&app_state, book_id).await?;
    Ok(Json(conversation_task::get_conversation(&app_state, &book).await?))
}

/// Send a reader message and receive the assistant's reply.
#[utoipa::path(
    post,
    path = "/books/{id}/conversation/messages",
    params(("id" = Uuid, Path, description = "The book id.")),
    request_body = SendMessageRequest,
    responses(
        (status = 200, description = "Messages appended by this turn", body = TurnResponse),
        (status = 400, description = "Missing message"),
        (status = 404, description = "Book not found"),
        (status = 409, description = "The conversation changed concurrently")
    )
)]
pub async fn send_message_handler(
    State(app_state): State<Arc<AppState>>,
    Path(book_id): Path<Uuid>,
    Json(payload): Json<SendMessageRequest>,
) -> Result<Json<TurnResponse>, ApiError> {
    let text = required_text(payload.message, "Missing message")?;
    let book = find_book(&app_state, book_id).await?;
    Ok(Json(conversation_task::send_message(&app_state, &book, &text).await?))
}

/// Accept the welcome offer and generate a mind map in one shot.
///
/// A failed generation is reported in `error` and the conversation continues
/// with manual building.
#[utoipa::path(
    post,
    path = "/books/{id}/conversation/accept",
    params(("id" = Uuid, Path, description = "The book id.")),
    request_body = AcceptRequest,
    responses(
        (status = 200, description = "Messages appended by this action", body = TurnResponse),
        (status = 400, description = "Invalid lens data"),
        (status = 404, description = "Book not found"),
        (status = 409, description = "The conversation changed concurrently")
    )
)]
pub async fn accept_handler(
    State(app_state): State<Arc<AppState>>,
    Path(book_id): Path<Uuid>,
    payload: Option<Json<AcceptRequest>>,
) -> Result<Json<TurnResponse>, ApiError> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    let lens = payload.lens_data.as_ref().map(|data| data.to_request()).transpose()?;
    let book = find_book(&app_state, book_id).await?;
    Ok(Json(conversation_task::accept(&app_state, &book, lens).await?))
}

#[utoipa::path(
    post,
    path = "/books/{id}/conversation/decline",
    params(("id" = Uuid, Path, description = "The book id.")),
    responses(
        (status = 200, description = "Messages appended by this action", body = TurnResponse),
        (status = 404, description = "Book not found"),
        (status = 409, description = "The conversation is past the welcome step")
    )
)]
pub async fn decline_handler(
    State(app_state): State<Arc<AppState>>,
    Path(book_id): Path<Uuid>,
) -> Result<Json<TurnResponse>, ApiError> {
    let book = find_book(&app_state, book_id).await?;
    Ok(Json(conversation_task::decline(&app_state, &book).await?))
}

/// Delete every message and start again from a single welcome message.
#[utoipa::path(
    post,
    path = "/books/{id}/conversation/start-over",
    params(("id" = Uuid, Path, description = "The book id.")),
    responses(
        (status = 200, description = "The fresh conversation", body = TurnResponse),
        (status = 404, description = "Book not found"),
        (status = 409, description = "The conversation changed concurrently")
    )
)]
pub async fn start_over_handler(
    State(app_state): State<Arc<AppState>>,
    Path(book_id): Path<Uuid>,
) -> Result<Json<TurnResponse>, ApiError> {
    let book = find_book(&app_state, book_id).await?;
    Ok(Json(conversation_task::start_over(&app_state, &book).await?))
}
