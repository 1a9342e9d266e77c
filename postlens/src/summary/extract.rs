//! Turns raw model output into a [`SummaryRecord`].
//!
//! Extraction runs in two stages: [`strip_fence`] removes a markdown code
//! fence if there is one, then [`parse_payload`] parses and normalizes the
//! JSON object strictly.

use serde_json::{Map, Value};

use super::SummaryRecord;

/// Score used when the model returns a non-numeric confidence
pub const DEFAULT_CONFIDENCE: f64 = 75.0;

/// Upper bounds on list lengths; extra entries from the model are dropped
pub const MAX_HIGHLIGHTS: usize = 5;
pub const MAX_KEYWORDS: usize = 8;

const REQUIRED_FIELDS: [&str; 4] = ["summary", "highlights", "keywords", "confidence_score"];

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExtractError {
    #[error("malformed model response: {0}")]
    MalformedResponse(String),
}

/// Extract a record from raw model text. `model_version` is left empty and
/// `regenerated` false; the caller stamps both.
pub fn extract(raw: &str) -> Result<SummaryRecord, ExtractError> {
    parse_payload(strip_fence(raw))
}

/// Candidate JSON payload: the body of a ```json fence, else the body of the
/// first generic fence, else the whole text.
pub fn strip_fence(raw: &str) -> &str {
    if let Some(start) = raw.find("```json") {
        return fenced_body(&raw[start + "```json".len()..]);
    }
    if let Some(start) = raw.find("```") {
        return fenced_body(&raw[start + "```".len()..]);
    }
    raw
}

fn fenced_body(rest: &str) -> &str {
    match rest.find("```") {
        Some(end) => rest[..end].trim(),
        None => rest.trim(),
    }
}

/// Strict stage: the payload must be a JSON object carrying every required
/// field. Type drift in highlights, keywords and confidence is normalized.
pub fn parse_payload(payload: &str) -> Result<SummaryRecord, ExtractError> {
    let value: Value = serde_json::from_str(payload)
        .map_err(|e| ExtractError::MalformedResponse(format!("invalid JSON: {}", e)))?;

    let Value::Object(mut obj) = value else {
        return Err(ExtractError::MalformedResponse(
            "payload is not a JSON object".into(),
        ));
    };

    if let Some(missing) = REQUIRED_FIELDS.iter().find(|f| !obj.contains_key(**f)) {
        return Err(ExtractError::MalformedResponse(format!(
            "missing required field: {}",
            missing
        )));
    }

    let summary = take(&mut obj, "summary").map(into_text).unwrap_or_default();
    if summary.trim().is_empty() {
        return Err(ExtractError::MalformedResponse("summary is empty".into()));
    }

    Ok(SummaryRecord {
        summary,
        highlights: take(&mut obj, "highlights")
            .map(|v| into_list(v, MAX_HIGHLIGHTS))
            .unwrap_or_default(),
        keywords: take(&mut obj, "keywords")
            .map(|v| into_list(v, MAX_KEYWORDS))
            .unwrap_or_default(),
        model_version: String::new(),
        confidence_score: take(&mut obj, "confidence_score")
            .map(|v| normalize_confidence(&v))
            .unwrap_or(DEFAULT_CONFIDENCE),
        regenerated: false,
    })
}

/// Numbers are clamped into [0, 100]; anything else becomes the default.
pub fn normalize_confidence(value: &Value) -> f64 {
    match value.as_f64() {
        Some(score) if score.is_finite() => score.clamp(0.0, 100.0),
        _ => DEFAULT_CONFIDENCE,
    }
}

fn take(obj: &mut Map<String, Value>, key: &str) -> Option<Value> {
    obj.remove(key)
}

fn into_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

fn into_list(value: Value, limit: usize) -> Vec<String> {
    match value {
        Value::Array(items) => items.into_iter().take(limit).map(into_text).collect(),
        other => vec![into_text(other)],
    }
}
