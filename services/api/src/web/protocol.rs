//! services/api/src/web/protocol.rs
//!
//! Defines the JSON payloads exchanged between the browser client and the API
//! server.

use crate::error::ApiError;
use chrono::{DateTime, Utc};
use readtention_core::domain::{Book, ConversationMessage, Insight, MindMap, Note};
use readtention_core::lens::LensConfig;
use readtention_core::{LensRequest, LensSelection, Preset, Stage};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

//=========================================================================================
// Lens Payload
//=========================================================================================

/// The lens selection sent with a generation request.
#[derive(Deserialize, Serialize, Debug, Clone, Default, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LensData {
    /// Lens key → intensity in `[0, 1]`. Key order is significant.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub selected_modes: serde_json::Map<String, serde_json::Value>,
    /// A preset id such as `deep-thinker`, or `custom`.
    #[serde(default)]
    pub preset: Option<String>,
}

impl LensData {
    /// Validates the payload into a core lens request.
    pub fn to_request(&self) -> Result<LensRequest, ApiError> {
        let mut pairs = Vec::with_capacity(self.selected_modes.len());
        for (key, value) in &self.selected_modes {
            let intensity = value.as_f64().ok_or_else(|| {
                ApiError::MissingInput(format!("Intensity for lens '{}' must be a number", key))
            })?;
            pairs.push((key.as_str(), intensity));
        }
        let selection = LensSelection::from_pairs(pairs)?;
        Ok(LensRequest::resolve(selection, self.preset.clone()))
    }
}

//=========================================================================================
// Requests
//=========================================================================================

#[derive(Deserialize, Debug, ToSchema)]
pub struct GenerateMindmapRequest {
    pub book_id: Option<Uuid>,
    #[serde(rename = "lensData")]
    pub lens_data: Option<LensData>,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct ReflectRequest {
    pub message: Option<String>,
    pub book_id: Option<Uuid>,
    pub message_id: Option<Uuid>,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct ExtractInsightsRequest {
    pub book_id: Option<Uuid>,
    pub message_id: Option<Uuid>,
    pub message: Option<String>,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct CreateBookRequest {
    pub title: Option<String>,
    pub author: Option<String>,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct SendMessageRequest {
    pub message: Option<String>,
}

#[derive(Deserialize, Debug, Default, ToSchema)]
pub struct AcceptRequest {
    #[serde(rename = "lensData")]
    pub lens_data: Option<LensData>,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct CreateNoteRequest {
    #[serde(default)]
    pub themes: String,
    #[serde(default)]
    pub quotes: String,
    #[serde(default)]
    pub takeaways: String,
}

#[derive(Deserialize, Debug)]
pub struct SearchParams {
    pub q: Option<String>,
    pub author: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Deserialize, Debug)]
pub struct TrendingParams {
    pub subject: Option<String>,
    pub limit: Option<usize>,
}

/// Returns the trimmed value, or `MissingInput` if it is absent or blank.
pub fn required_text(value: Option<String>, message: &str) -> Result<String, ApiError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::MissingInput(message.to_string()))
}

//=========================================================================================
// Responses
//=========================================================================================

#[derive(Serialize, Debug, ToSchema)]
pub struct GenerateMindmapResponse {
    pub mindmap: String,
    pub success: bool,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct ReflectResponse {
    pub ai_response: String,
}

#[derive(Serialize, Debug, Clone, ToSchema)]
pub struct BookResponse {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
}

impl From<Book> for BookResponse {
    fn from(book: Book) -> Self {
        Self {
            id: book.id,
            title: book.title,
            author: book.author,
            created_at: book.created_at,
        }
    }
}

#[derive(Serialize, Debug, Clone, ToSchema)]
pub struct MessageResponse {
    pub id: Uuid,
    pub book_id: Uuid,
    /// `user` or `ai`.
    pub role: String,
    pub content: String,
    /// `welcome`, `mindmap_generated` or null.
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<ConversationMessage> for MessageResponse {
    fn from(message: ConversationMessage) -> Self {
        Self {
            id: message.id,
            book_id: message.book_id,
            role: message.role.as_str().to_string(),
            content: message.content,
            kind: message.kind.map(|k| k.as_str().to_string()),
            created_at: message.created_at,
        }
    }
}

#[derive(Serialize, Debug, ToSchema)]
pub struct ConversationResponse {
    pub book_id: Uuid,
    pub stage: String,
    pub messages: Vec<MessageResponse>,
    /// The latest generated mind map, or the outline built so far.
    pub mindmap: Option<String>,
}

/// The result of one conversation action: the messages it appended and where
/// the conversation now stands.
#[derive(Serialize, Debug, ToSchema)]
pub struct TurnResponse {
    pub stage: String,
    pub messages: Vec<MessageResponse>,
    pub mindmap: Option<String>,
    /// Set when a one-shot generation failed; the conversation continues manually.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TurnResponse {
    pub fn new(stage: Stage, messages: Vec<ConversationMessage>, mindmap: Option<String>) -> Self {
        Self {
            stage: stage.as_str().to_string(),
            messages: messages.into_iter().map(MessageResponse::from).collect(),
            mindmap,
            error: None,
        }
    }
}

#[derive(Serialize, Debug, ToSchema)]
pub struct MindMapResponse {
    pub id: Uuid,
    pub book_id: Uuid,
    pub content: String,
    pub generation_prompt: Option<String>,
    pub ai_model: Option<String>,
    #[schema(value_type = Object)]
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl From<MindMap> for MindMapResponse {
    fn from(mindmap: MindMap) -> Self {
        Self {
            id: mindmap.id,
            book_id: mindmap.book_id,
            content: mindmap.content,
            generation_prompt: mindmap.generation_prompt,
            ai_model: mindmap.ai_model,
            metadata: mindmap.metadata,
            created_at: mindmap.created_at,
        }
    }
}

#[derive(Serialize, Debug, ToSchema)]
pub struct NoteResponse {
    pub id: Uuid,
    pub book_id: Uuid,
    pub themes: String,
    pub quotes: String,
    pub takeaways: String,
    pub created_at: DateTime<Utc>,
}

impl From<Note> for NoteResponse {
    fn from(note: Note) -> Self {
        Self {
            id: note.id,
            book_id: note.book_id,
            themes: note.themes,
            quotes: note.quotes,
            takeaways: note.takeaways,
            created_at: note.created_at,
        }
    }
}

#[derive(Serialize, Debug, ToSchema)]
pub struct InsightResponse {
    pub id: Uuid,
    pub book_id: Uuid,
    pub message_id: Uuid,
    pub themes: Vec<String>,
    pub quotes: Vec<String>,
    pub takeaways: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Insight> for InsightResponse {
    fn from(insight: Insight) -> Self {
        Self {
            id: insight.id,
            book_id: insight.book_id,
            message_id: insight.message_id,
            themes: insight.themes,
            quotes: insight.quotes,
            takeaways: insight.takeaways,
            created_at: insight.created_at,
        }
    }
}

#[derive(Serialize, Debug, ToSchema)]
pub struct ExtractInsightsResponse {
    pub insight: InsightResponse,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct LensResponse {
    pub key: String,
    pub name: String,
    pub icon: String,
    pub description: String,
    pub sections: Vec<String>,
}

impl From<&LensConfig> for LensResponse {
    fn from(config: &LensConfig) -> Self {
        Self {
            key: config.key.as_str().to_string(),
            name: config.display_name.to_string(),
            icon: config.icon.to_string(),
            description: config.description.to_string(),
            sections: config.sections.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Serialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PresetResponse {
    pub id: String,
    pub name: String,
    pub icon: String,
    pub description: String,
    pub tags: Vec<String>,
    #[schema(value_type = Object)]
    pub selected_modes: serde_json::Value,
}

impl From<&Preset> for PresetResponse {
    fn from(preset: &Preset) -> Self {
        Self {
            id: preset.id.to_string(),
            name: preset.name.to_string(),
            icon: preset.icon.to_string(),
            description: preset.description.to_string(),
            tags: preset.tags.iter().map(|t| t.to_string()).collect(),
            selected_modes: preset.selection().to_json(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use readtention_core::Lens;

    #[test]
    fn lens_data_keeps_key_order() {
        let data: LensData = serde_json::from_str(
            r#"{"selectedModes": {"practical": 1.0, "creative": 0.7}, "preset": "custom", "totalModes": 2}"#,
        )
        .unwrap();
        let request = data.to_request().unwrap();
        let lenses: Vec<Lens> = request.selection.lenses().collect();
        assert_eq!(lenses, vec![Lens::Practical, Lens::Creative]);
        assert_eq!(request.preset, None);
    }

    #[test]
    fn lens_data_rejects_unknown_lenses_and_non_numbers() {
        let data: LensData = serde_json::from_str(r#"{"selectedModes": {"spiritual": 0.4}}"#).unwrap();
        assert!(matches!(data.to_request(), Err(ApiError::MissingInput(_))));

        let data: LensData = serde_json::from_str(r#"{"selectedModes": {"creative": "high"}}"#).unwrap();
        assert!(matches!(data.to_request(), Err(ApiError::MissingInput(_))));
    }

    #[test]
    fn preset_only_payload_expands_to_preset_weights() {
        let data: LensData = serde_json::from_str(r#"{"preset": "people-person"}"#).unwrap();
        let request = data.to_request().unwrap();
        assert_eq!(request.selection.get(Lens::Character), Some(1.0));
        assert_eq!(request.preset_label(), "people-person");
    }

    #[test]
    fn required_text_rejects_blank() {
        assert!(required_text(Some("   ".into()), "Missing message").is_err());
        assert_eq!(required_text(Some(" hi ".into()), "Missing message").unwrap(), "hi");
    }
}
