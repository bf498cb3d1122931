//! services/api/src/web/mindmap_task.rs
//!
//! Mind-map generation: the one-shot lens-driven map and the map grounded in
//! a book's conversation and extracted insights.

use crate::{error::ApiError, web::state::AppState};
use chrono::Utc;
use readtention_core::{
    domain::{Book, MessageRole, MindMap},
    ports::{ChatTurn, CompletionRequest},
    prompt::{conversation_mindmap_prompt, mindmap_prompt},
    LensRequest,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

const MINDMAP_MAX_TOKENS: u32 = 2000;
const MINDMAP_TEMPERATURE: f32 = 0.7;

/// Generates a one-shot mind map for `book`, optionally shaped by a lens request.
///
/// Text-generation failures are returned as `ApiError::Upstream`. A failure to
/// record the result is only logged; the caller still receives the markdown.
pub async fn generate_mindmap(
    app_state: &Arc<AppState>,
    book: &Book,
    lens: Option<&LensRequest>,
) -> Result<String, ApiError> {
    let prompt = mindmap_prompt(&book.title, &book.author, lens);
    let markdown = complete_mindmap(app_state, &prompt).await?;

    let metadata = json!({
        "lensData": lens.map(|request| json!({
            "selectedModes": request.selection.to_json(),
            "preset": request.preset_label(),
        })),
        "generatedAt": Utc::now().to_rfc3339(),
        "customization": if lens.is_some() { "lens-customized" } else { "default" },
    });
    let model = app_state.mindmap_llm.model().to_string();
    persist_mindmap(app_state, book.id, &markdown, Some(prompt), Some(model), metadata).await;

    Ok(markdown)
}

/// Generates a mind map from everything the reader has said about `book` and
/// the insights extracted from it.
pub async fn generate_from_conversation(app_state: &Arc<AppState>, book: &Book) -> Result<String, ApiError> {
    let messages = app_state.db.get_messages_for_book(book.id).await?;
    let user_messages: Vec<String> = messages
        .into_iter()
        .filter(|m| m.role == MessageRole::User)
        .map(|m| m.content)
        .collect();
    if user_messages.is_empty() {
        return Err(ApiError::MissingInput(
            "No reader messages to build a mind map from".to_string(),
        ));
    }
    let insights = app_state.db.get_insights_for_book(book.id).await?;

    let prompt = conversation_mindmap_prompt(book, &user_messages, &insights);
    let markdown = complete_mindmap(app_state, &prompt).await?;

    let metadata = json!({
        "generatedAt": Utc::now().to_rfc3339(),
        "customization": "conversation",
        "messageCount": user_messages.len(),
        "insightCount": insights.len(),
    });
    let model = app_state.mindmap_llm.model().to_string();
    persist_mindmap(app_state, book.id, &markdown, Some(prompt), Some(model), metadata).await;

    Ok(markdown)
}

async fn complete_mindmap(app_state: &Arc<AppState>, prompt: &str) -> Result<String, ApiError> {
    let request = CompletionRequest::new(vec![ChatTurn::user(prompt)])
        .max_tokens(MINDMAP_MAX_TOKENS)
        .temperature(MINDMAP_TEMPERATURE);
    let markdown = app_state.mindmap_llm.complete(request).await?;
    info!("Generated a mind map of {} characters.", markdown.len());
    Ok(markdown)
}

/// Records a generated mind map. Failures are logged and swallowed.
pub async fn persist_mindmap(
    app_state: &Arc<AppState>,
    book_id: Uuid,
    content: &str,
    generation_prompt: Option<String>,
    ai_model: Option<String>,
    metadata: serde_json::Value,
) {
    let mindmap = MindMap {
        id: Uuid::new_v4(),
        book_id,
        content: content.to_string(),
        generation_prompt,
        ai_model,
        metadata,
        created_at: Utc::now(),
    };
    if let Err(e) = app_state.db.save_mindmap(mindmap).await {
        warn!("Failed to save mind map for book {}: {}", book_id, e);
    }
}
