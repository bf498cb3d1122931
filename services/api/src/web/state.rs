//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use readtention_core::ports::{BookSearchService, DatabaseService, TextGenerationService};
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
///
/// Each text-generation use gets its own adapter so the model can be chosen per task.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub config: Arc<Config>,
    pub mindmap_llm: Arc<dyn TextGenerationService>,
    pub reflect_llm: Arc<dyn TextGenerationService>,
    pub insight_llm: Arc<dyn TextGenerationService>,
    pub book_search: Arc<dyn BookSearchService>,
}
