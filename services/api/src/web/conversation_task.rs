//! services/api/src/web/conversation_task.rs
//!
//! The per-book mind-map conversation. Each action loads the persisted
//! conversation state, runs it through the `StageMachine`, saves it back with
//! a version check, and only then appends the resulting messages.

use crate::{
    error::ApiError,
    web::{
        mindmap_task::{generate_mindmap, persist_mindmap},
        protocol::{ConversationResponse, MessageResponse, TurnResponse},
        reflect_task::{extract_insight_in_background, socratic_reply},
        state::AppState,
    },
};
use chrono::Utc;
use readtention_core::{
    domain::{Book, ConversationMessage, ConversationState, MessageKind, MessageRole},
    ports::{ChatTurn, CompletionRequest, PortError},
    prompt::{branches_prompt, central_idea_prompt, sub_branches_prompt, FALLBACK_REPLY},
    stage::{
        generated_message, generating_message, generation_failed_message, initial_stage,
        welcome_message, DECLINED_MESSAGE,
    },
    LensRequest, Stage, StageMachine, StepRequest,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};

const OUTLINE_TEMPERATURE: f32 = 0.3;

//=========================================================================================
// State Loading and Saving
//=========================================================================================

/// Loads the conversation for `book`, initializing it on first use.
///
/// A book with no messages starts at `welcome` and gets the welcome message.
/// A book that has messages but no saved state resumes in refinement.
async fn load_machine(app_state: &Arc<AppState>, book: &Book) -> Result<StageMachine, ApiError> {
    if let Some(state) = app_state.db.get_conversation_state(book.id).await? {
        return Ok(StageMachine::new(state));
    }

    let has_messages = !app_state.db.get_messages_for_book(book.id).await?.is_empty();
    let initial = ConversationState::new(book.id, initial_stage(has_messages));
    match app_state.db.save_conversation_state(initial).await {
        Ok(state) => {
            info!("Initialized conversation for book {} at '{}'", book.id, state.stage);
            if !has_messages {
                post(app_state, ai_message(book, welcome_message(&book.title)).with_kind(MessageKind::Welcome))
                    .await?;
            }
            Ok(StageMachine::new(state))
        }
        // A concurrent request initialized it first; use theirs.
        Err(PortError::Conflict(_)) => app_state
            .db
            .get_conversation_state(book.id)
            .await?
            .map(StageMachine::new)
            .ok_or_else(|| ApiError::Conflict("Conversation state changed concurrently".to_string())),
        Err(e) => Err(e.into()),
    }
}

async fn save(app_state: &Arc<AppState>, machine: StageMachine) -> Result<StageMachine, ApiError> {
    let state = app_state.db.save_conversation_state(machine.into_state()).await?;
    Ok(StageMachine::new(state))
}

async fn post(app_state: &Arc<AppState>, message: ConversationMessage) -> Result<ConversationMessage, ApiError> {
    Ok(app_state.db.append_message(message).await?)
}

fn ai_message(book: &Book, content: impl Into<String>) -> ConversationMessage {
    ConversationMessage::new(book.id, MessageRole::Ai, content)
}

/// The mind map to show next to the conversation: the outline built so far,
/// or the latest saved mind map once the conversation is in refinement.
async fn current_mindmap(app_state: &Arc<AppState>, book: &Book, machine: &StageMachine) -> Result<Option<String>, ApiError> {
    if !machine.state().tree.is_empty() {
        return Ok(Some(machine.markdown()));
    }
    if machine.stage() != Stage::Refinement {
        return Ok(None);
    }
    let latest = app_state.db.get_mindmaps_for_book(book.id).await?.into_iter().next();
    Ok(latest.map(|m| m.content))
}

fn outline_prompt(book: &Book, request: &StepRequest) -> Option<String> {
    match request {
        StepRequest::CentralIdea => Some(central_idea_prompt(book)),
        StepRequest::Branches { central_idea } => Some(branches_prompt(book, central_idea)),
        StepRequest::SubBranches { central_idea, branch } => {
            Some(sub_branches_prompt(book, central_idea, branch))
        }
        StepRequest::Reflect => None,
    }
}

//=========================================================================================
// Conversation Actions
//=========================================================================================

/// Returns the whole conversation, initializing it if this is the first visit.
pub async fn get_conversation(app_state: &Arc<AppState>, book: &Book) -> Result<ConversationResponse, ApiError> {
    let machine = load_machine(app_state, book).await?;
    let messages = app_state.db.get_messages_for_book(book.id).await?;
    let mindmap = current_mindmap(app_state, book, &machine).await?;
    Ok(ConversationResponse {
        book_id: book.id,
        stage: machine.stage().as_str().to_string(),
        messages: messages.into_iter().map(MessageResponse::from).collect(),
        mindmap,
    })
}

/// Handles one message typed by the reader.
///
/// While the outline is being built the model distills the message into the
/// current step. Afterwards the reader gets a Socratic reply and the message
/// is mined for insights in the background. If the model is unreachable the
/// fallback reply is posted and the stage does not move.
pub async fn send_message(app_state: &Arc<AppState>, book: &Book, text: &str) -> Result<TurnResponse, ApiError> {
    let mut machine = load_machine(app_state, book).await?;
    let user_message = ConversationMessage::new(book.id, MessageRole::User, text);
    let mut replies = Vec::new();
    let mut outline_completed = false;
    let mut reflective = false;

    match outline_prompt(book, &machine.next_request()) {
        None => {
            reflective = true;
            replies.push(socratic_reply(app_state, book, text).await);
        }
        Some(system) => {
            let request = CompletionRequest::new(vec![ChatTurn::system(system), ChatTurn::user(text)])
                .temperature(OUTLINE_TEMPERATURE);
            match app_state.reflect_llm.complete(request).await {
                Ok(reply) => {
                    let outcome = machine.apply_reply(&reply);
                    outline_completed = outcome.advanced && machine.stage() == Stage::Refinement;
                    replies.push(outcome.follow_up);
                }
                Err(e) => {
                    warn!("Outline step for book {} failed at '{}': {}", book.id, machine.stage(), e);
                    replies.push(FALLBACK_REPLY.to_string());
                }
            }
        }
    }

    let machine = save(app_state, machine).await?;

    let user_message = post(app_state, user_message).await?;
    let mut messages = vec![user_message.clone()];
    for reply in replies {
        messages.push(post(app_state, ai_message(book, reply)).await?);
    }

    if reflective {
        tokio::spawn(extract_insight_in_background(
            app_state.clone(),
            book.clone(),
            user_message.id,
            user_message.content,
        ));
    }
    if outline_completed {
        let metadata = json!({
            "generatedAt": Utc::now().to_rfc3339(),
            "customization": "step-by-step",
        });
        persist_mindmap(app_state, book.id, &machine.markdown(), None, None, metadata).await;
    }

    let mindmap = current_mindmap(app_state, book, &machine).await?;
    Ok(TurnResponse::new(machine.stage(), messages, mindmap))
}

/// Accepts the welcome offer: generates a one-shot mind map, falling back to
/// building it by hand if generation fails.
pub async fn accept(
    app_state: &Arc<AppState>,
    book: &Book,
    lens: Option<LensRequest>,
) -> Result<TurnResponse, ApiError> {
    let mut machine = load_machine(app_state, book).await?;
    let lens_keys: Vec<&str> = lens
        .as_ref()
        .map(|request| request.selection.lenses().map(|l| l.as_str()).collect())
        .unwrap_or_default();

    let mut messages = vec![post(app_state, ai_message(book, generating_message(&book.title, &lens_keys))).await?];

    // The new map replaces any outline built so far.
    machine.reset();
    match generate_mindmap(app_state, book, lens.as_ref()).await {
        Ok(markdown) => {
            machine.finish();
            let machine = save(app_state, machine).await?;
            let done = ai_message(book, generated_message(&lens_keys)).with_kind(MessageKind::MindmapGenerated);
            messages.push(post(app_state, done).await?);
            Ok(TurnResponse::new(machine.stage(), messages, Some(markdown)))
        }
        Err(e) => {
            error!("One-shot mind map for book {} failed: {}", book.id, e);
            machine.begin_manual();
            let machine = save(app_state, machine).await?;
            let upstream = matches!(e, ApiError::Upstream(_));
            messages.push(post(app_state, ai_message(book, generation_failed_message(&book.title, upstream))).await?);
            let mut response = TurnResponse::new(machine.stage(), messages, None);
            response.error = Some(e.to_string());
            Ok(response)
        }
    }
}

/// Declines the welcome offer. Rejected once the conversation has moved on.
pub async fn decline(app_state: &Arc<AppState>, book: &Book) -> Result<TurnResponse, ApiError> {
    let mut machine = load_machine(app_state, book).await?;
    if !machine.decline() {
        return Err(ApiError::Conflict(format!(
            "Cannot decline a conversation at '{}'",
            machine.stage()
        )));
    }
    let machine = save(app_state, machine).await?;
    let message = post(app_state, ai_message(book, DECLINED_MESSAGE)).await?;
    Ok(TurnResponse::new(machine.stage(), vec![message], None))
}

/// Deletes the conversation and starts again from a single welcome message.
///
/// The history is only deleted once the reset state is saved, so a stale
/// request leaves the conversation untouched.
pub async fn start_over(app_state: &Arc<AppState>, book: &Book) -> Result<TurnResponse, ApiError> {
    let mut machine = load_machine(app_state, book).await?;
    machine.reset();
    let machine = save(app_state, machine).await?;
    app_state.db.delete_messages_for_book(book.id).await?;
    let welcome = ai_message(book, welcome_message(&book.title)).with_kind(MessageKind::Welcome);
    let welcome = post(app_state, welcome).await?;
    info!("Conversation for book {} started over.", book.id);
    Ok(TurnResponse::new(machine.stage(), vec![welcome], None))
}
