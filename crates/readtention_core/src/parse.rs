//! crates/readtention_core/src/parse.rs
//!
//! Helpers for pulling structure back out of model output.

use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Model output was not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

/// Strips a surrounding markdown code fence (```` ``` ```` or ```` ```json ````)
/// if present.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. `json`) on the opening fence line.
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// Extracts an ordered list of items from a model reply.
///
/// A JSON array of strings (optionally fenced) is preferred. Otherwise the
/// reply is treated as prose: bullet or numbered lines if there are several
/// lines, else a comma-separated list. Empty items are dropped.
pub fn parse_items(reply: &str) -> Vec<String> {
    let body = strip_code_fences(reply);
    if let Ok(items) = serde_json::from_str::<Vec<String>>(body) {
        return clean(items.into_iter());
    }

    let lines: Vec<&str> = body.lines().filter(|l| !l.trim().is_empty()).collect();
    if lines.len() > 1 {
        return clean(lines.into_iter().map(strip_list_marker).map(str::to_string));
    }
    clean(body.split(',').map(strip_list_marker).map(str::to_string))
}

fn strip_list_marker(line: &str) -> &str {
    let line = line.trim();
    if let Some(rest) = line.strip_prefix("- ").or_else(|| line.strip_prefix("* ")) {
        return rest;
    }
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(rest) = rest.strip_prefix(". ").or_else(|| rest.strip_prefix(") ")) {
            return rest;
        }
    }
    line
}

fn clean(items: impl Iterator<Item = String>) -> Vec<String> {
    items
        .map(|item| item.trim().trim_matches('"').trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

/// The structured payload requested from the insight-extraction prompt.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct InsightDraft {
    #[serde(default)]
    pub themes: Vec<String>,
    #[serde(default)]
    pub quotes: Vec<String>,
    #[serde(default)]
    pub takeaways: Vec<String>,
}

pub fn parse_insight_draft(reply: &str) -> Result<InsightDraft, ParseError> {
    Ok(serde_json::from_str(strip_code_fences(reply))?)
}
