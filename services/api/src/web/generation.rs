//! services/api/src/web/generation.rs
//!
//! Axum handlers for the endpoints that call the text-generation service:
//! mind maps, Socratic reflection and insight extraction.

use crate::{
    error::ApiError,
    web::{
        mindmap_task::{generate_from_conversation, generate_mindmap},
        protocol::{
            required_text, ExtractInsightsRequest, ExtractInsightsResponse, GenerateMindmapRequest,
            GenerateMindmapResponse, InsightResponse, MindMapResponse, ReflectRequest, ReflectResponse,
        },
        reflect_task::{extract_insight, extract_insight_in_background, socratic_reply},
        rest::find_book,
        state::AppState,
    },
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

//=========================================================================================
// Mind Maps
//=========================================================================================

/// Generate a one-shot mind map, optionally shaped by reading lenses.
#[utoipa::path(
    post,
    path = "/generate-mindmap",
    request_body = GenerateMindmapRequest,
    responses(
        (status = 200, description = "Mind map generated", body = GenerateMindmapResponse),
        (status = 400, description = "Missing book_id or invalid lens data"),
        (status = 404, description = "Book not found"),
        (status = 500, description = "Text generation failed")
    )
)]
pub async fn generate_mindmap_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<GenerateMindmapRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let book_id = payload
        .book_id
        .ok_or_else(|| ApiError::MissingInput("Missing book_id".to_string()))?;
    let lens = payload.lens_data.as_ref().map(|data| data.to_request()).transpose()?;
    let book = find_book(&app_state, book_id).await?;

    info!("Generating mind map for '{}'", book.title);
    let mindmap = generate_mindmap(&app_state, &book, lens.as_ref()).await?;
    Ok(Json(GenerateMindmapResponse { mindmap, success: true }))
}

/// Generate a mind map from the book's conversation and extracted insights.
#[utoipa::path(
    post,
    path = "/books/{id}/mindmaps/from-conversation",
    params(("id" = Uuid, Path, description = "The book id.")),
    responses(
        (status = 200, description = "Mind map generated", body = GenerateMindmapResponse),
        (status = 400, description = "The reader has not said anything yet"),
        (status = 404, description = "Book not found"),
        (status = 500, description = "Text generation failed")
    )
)]
pub async fn conversation_mindmap_handler(
    State(app_state): State<Arc<AppState>>,
    Path(book_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let book = find_book(&app_state, book_id).await?;
    let mindmap = generate_from_conversation(&app_state, &book).await?;
    Ok(Json(GenerateMindmapResponse { mindmap, success: true }))
}

#[utoipa::path(
    get,
    path = "/books/{id}/mindmaps",
    params(("id" = Uuid, Path, description = "The book id.")),
    responses((status = 200, description = "Saved mind maps, newest first", body = [MindMapResponse]))
)]
pub async fn list_mindmaps_handler(
    State(app_state): State<Arc<AppState>>,
    Path(book_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let book = find_book(&app_state, book_id).await?;
    let mindmaps = app_state.db.get_mindmaps_for_book(book.id).await?;
    Ok(Json(mindmaps.into_iter().map(MindMapResponse::from).collect::<Vec<_>>()))
}

#[utoipa::path(
    get,
    path = "/books/{id}/mindmaps/latest",
    params(("id" = Uuid, Path, description = "The book id.")),
    responses(
        (status = 200, description = "The newest saved mind map", body = MindMapResponse),
        (status = 404, description = "Book not found or no mind map saved yet")
    )
)]
pub async fn latest_mindmap_handler(
    State(app_state): State<Arc<AppState>>,
    Path(book_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let book = find_book(&app_state, book_id).await?;
    let latest = app_state
        .db
        .get_mindmaps_for_book(book.id)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::NotFound("No mind map saved for this book".to_string()))?;
    Ok(Json(MindMapResponse::from(latest)))
}

//=========================================================================================
// Reflection and Insights
//=========================================================================================

/// Answer a reader's reflection with a Socratic question.
///
/// Always answers: if the model is unavailable a fixed fallback reply is
/// returned. When `message_id` is given, insights are extracted in the background.
#[utoipa::path(
    post,
    path = "/reflect",
    request_body = ReflectRequest,
    responses(
        (status = 200, description = "The reply", body = ReflectResponse),
        (status = 400, description = "Missing message or book_id"),
        (status = 404, description = "Book not found")
    )
)]
pub async fn reflect_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<ReflectRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let missing = || ApiError::MissingInput("Missing message or book_id".to_string());
    let message = payload
        .message
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
        .ok_or_else(missing)?;
    let book_id = payload.book_id.ok_or_else(missing)?;
    let book = find_book(&app_state, book_id).await?;

    let ai_response = socratic_reply(&app_state, &book, &message).await;

    if let Some(message_id) = payload.message_id {
        tokio::spawn(extract_insight_in_background(
            app_state.clone(),
            book,
            message_id,
            message,
        ));
    }

    Ok(Json(ReflectResponse { ai_response }))
}

/// Extract themes, quotes and takeaways from one reader message.
#[utoipa::path(
    post,
    path = "/extract-insights",
    request_body = ExtractInsightsRequest,
    responses(
        (status = 201, description = "Insights saved", body = ExtractInsightsResponse),
        (status = 400, description = "Missing field"),
        (status = 404, description = "Book not found"),
        (status = 500, description = "Generation, parsing or saving failed")
    )
)]
pub async fn extract_insights_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<ExtractInsightsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let book_id = payload
        .book_id
        .ok_or_else(|| ApiError::MissingInput("Missing book_id".to_string()))?;
    let message_id = payload
        .message_id
        .ok_or_else(|| ApiError::MissingInput("Missing message_id".to_string()))?;
    let message = required_text(payload.message, "Missing message")?;
    let book = find_book(&app_state, book_id).await?;

    let insight = extract_insight(&app_state, &book, message_id, &message).await?;
    Ok((
        StatusCode::CREATED,
        Json(ExtractInsightsResponse {
            insight: InsightResponse::from(insight),
        }),
    ))
}
