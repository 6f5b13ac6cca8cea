//! Structured output extraction from raw model text.
//!
//! Models wrap JSON in markdown fences, prepend chatty preambles, or append
//! explanations. Extraction is a best-effort heuristic: strip fences, take the
//! span from the first `{` or `[` to the last matching closer, and parse it.

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

/// Extracts the first top-level JSON object or array from model output.
///
/// Returns `None` if no candidate span exists or it does not parse.
#[must_use]
pub fn extract_json(text: &str) -> Option<Value> {
    let cleaned = text.replace("```json", "").replace("```", "");
    let cleaned = cleaned.trim();

    let Some(span) = json_span(cleaned) else {
        debug!(len = text.len(), "No JSON structure found in model output");
        return None;
    };

    match serde_json::from_str(span) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(error = %e, sample = %sample(text), "Model output JSON did not parse");
            None
        }
    }
}

/// Returns `true` if a value carries usable structured output.
///
/// `null`, `[]`, and `{}` are all unusable.
#[must_use]
pub fn is_usable(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
        _ => true,
    }
}

/// Converts each element of a JSON array, dropping the ones that do not fit.
///
/// Returns an empty vector if `value` is not an array.
#[must_use]
pub fn typed_items<T: DeserializeOwned>(value: Value) -> Vec<T> {
    let Value::Array(items) = value else {
        return Vec::new();
    };

    let total = items.len();
    let parsed: Vec<T> = items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect();

    if parsed.len() < total {
        warn!(
            dropped = total - parsed.len(),
            kept = parsed.len(),
            "Dropped malformed items from model output"
        );
    }
    parsed
}

fn json_span(text: &str) -> Option<&str> {
    text.char_indices().find_map(|(start, c)| {
        let close = match c {
            '{' => '}',
            '[' => ']',
            _ => return None,
        };
        text.rfind(close)
            .filter(|end| *end > start)
            .map(|end| &text[start..=end])
    })
}

fn sample(text: &str) -> &str {
    let end = text
        .char_indices()
        .nth(500)
        .map_or(text.len(), |(i, _)| i);
    &text[..end]
}
