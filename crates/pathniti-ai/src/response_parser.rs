//! Merges model output back onto heuristic records.

use once_cell::sync::Lazy;
use pathniti_core::{AiEnhancement, Enhanceable};
use regex::Regex;
use serde_json::Value;
use tracing::warn;

/// Outermost `{ ... }` span, first opening brace to last closing brace.
static JSON_OBJECT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\{.*\}").expect("valid JSON object regex"));

const EXCERPT_CHARS: usize = 200;

/// Per-index commentary lists extracted from a model response.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct EnhancementPayload {
    pub reasoning: Vec<Option<String>>,
    pub insights: Vec<Option<String>>,
    pub advice: Vec<Option<String>>,
}

impl EnhancementPayload {
    fn entry(list: &[Option<String>], index: usize) -> Option<String> {
        list.get(index).cloned().flatten()
    }
}

/// Empty, null, false and zero entries count as absent.
fn entry_text(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        other => Some(other.to_string()),
    }
}

fn entries(object: &serde_json::Map<String, Value>, key: &str) -> Vec<Option<String>> {
    match object.get(key) {
        Some(Value::Array(items)) => items.iter().map(entry_text).collect(),
        _ => Vec::new(),
    }
}

/// Locate and decode the JSON object in `text`. `None` when there is no
/// brace span or it does not parse as an object.
pub fn extract_payload(text: &str) -> Option<EnhancementPayload> {
    let span = JSON_OBJECT.find(text)?;
    match serde_json::from_str::<Value>(span.as_str()) {
        Ok(Value::Object(object)) => Some(EnhancementPayload {
            reasoning: entries(&object, "reasoning"),
            insights: entries(&object, "insights"),
            advice: entries(&object, "advice"),
        }),
        Ok(_) => None,
        Err(e) => {
            warn!("Failed to parse Gemini response: {}", e);
            None
        }
    }
}

/// First 200 characters of `text`, with `...` appended when cut.
pub fn excerpt(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(EXCERPT_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

/// Attach the model's commentary to each record.
///
/// With a parsable payload, record `i` gets entry `i` of each list: reasoning
/// falls back to the record's own rationale, insights and advice to an empty
/// string. Otherwise every record gets the response excerpt as its insight.
pub fn merge_response<R: Enhanceable>(text: &str, mut recommendations: Vec<R>) -> Vec<R> {
    match extract_payload(text) {
        Some(payload) => {
            for (index, rec) in recommendations.iter_mut().enumerate() {
                let reasoning = EnhancementPayload::entry(&payload.reasoning, index)
                    .or_else(|| rec.base_reasoning().map(str::to_string));
                *rec.enhancement_mut() = AiEnhancement {
                    ai_enhanced_reasoning: reasoning,
                    ai_insights: Some(
                        EnhancementPayload::entry(&payload.insights, index).unwrap_or_default(),
                    ),
                    ai_advice: Some(
                        EnhancementPayload::entry(&payload.advice, index).unwrap_or_default(),
                    ),
                };
            }
        }
        None => {
            let insight = excerpt(text);
            for rec in recommendations.iter_mut() {
                rec.enhancement_mut().ai_insights = Some(insight.clone());
            }
        }
    }
    recommendations
}
