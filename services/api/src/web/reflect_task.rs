//! services/api/src/web/reflect_task.rs
//!
//! The Socratic reply to a reader's reflection, and the extraction of
//! structured insights from it.

use crate::{error::ApiError, web::state::AppState};
use chrono::Utc;
use readtention_core::{
    domain::{Book, Insight},
    parse::parse_insight_draft,
    ports::{ChatTurn, CompletionRequest},
    prompt::{insight_extraction_prompt, reflect_system_prompt, FALLBACK_REPLY},
};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

const REFLECT_MAX_TOKENS: u32 = 300;
const REFLECT_TEMPERATURE: f32 = 0.8;
const INSIGHT_TEMPERATURE: f32 = 0.2;

/// Answers a reflection with one probing question.
///
/// Never fails: if the model cannot be reached the fixed fallback reply is
/// returned instead.
pub async fn socratic_reply(app_state: &Arc<AppState>, book: &Book, message: &str) -> String {
    let request = CompletionRequest::new(vec![
        ChatTurn::system(reflect_system_prompt(book)),
        ChatTurn::user(message),
    ])
    .max_tokens(REFLECT_MAX_TOKENS)
    .temperature(REFLECT_TEMPERATURE);

    match app_state.reflect_llm.complete(request).await {
        Ok(reply) => reply.trim().to_string(),
        Err(e) => {
            warn!("Reflective reply for book {} failed, using fallback: {}", book.id, e);
            FALLBACK_REPLY.to_string()
        }
    }
}

/// Extracts themes, quotes and takeaways from one reader message and stores them.
///
/// Every failure is returned to the caller: an unreachable model, a reply
/// that is not the requested JSON, or a failed save.
pub async fn extract_insight(
    app_state: &Arc<AppState>,
    book: &Book,
    message_id: Uuid,
    message: &str,
) -> Result<Insight, ApiError> {
    let request = CompletionRequest::new(vec![
        ChatTurn::system(insight_extraction_prompt(book)),
        ChatTurn::user(message),
    ])
    .temperature(INSIGHT_TEMPERATURE);

    let reply = app_state.insight_llm.complete(request).await?;
    let draft = parse_insight_draft(&reply)?;

    let insight = Insight {
        id: Uuid::new_v4(),
        book_id: book.id,
        message_id,
        themes: draft.themes,
        quotes: draft.quotes,
        takeaways: draft.takeaways,
        created_at: Utc::now(),
    };
    app_state
        .db
        .save_insight(insight.clone())
        .await
        .map_err(|e| ApiError::Persistence(format!("Failed to save insights: {}", e)))?;

    info!(
        "Extracted {} themes, {} quotes, {} takeaways for message {}",
        insight.themes.len(),
        insight.quotes.len(),
        insight.takeaways.len(),
        message_id
    );
    Ok(insight)
}

/// Runs insight extraction in the background, logging any failure.
pub async fn extract_insight_in_background(
    app_state: Arc<AppState>,
    book: Book,
    message_id: Uuid,
    message: String,
) {
    if let Err(e) = extract_insight(&app_state, &book, message_id, &message).await {
        error!("Background insight extraction for message {} failed: {}", message_id, e);
    }
}
