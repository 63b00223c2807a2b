//! Locating and parsing the JSON payload inside a model's answer text.

use leopard_types::{LeopardError, Result};

const FENCE_OPEN: &str = "```json";
const FENCE_CLOSE: &str = "```";

/// Content of the first ```` ```json ... ``` ```` block, if the text has one.
pub fn fenced_json(answer: &str) -> Option<&str> {
    let start = answer.find(FENCE_OPEN)? + FENCE_OPEN.len();
    let rest = &answer[start..];
    let end = rest.find(FENCE_CLOSE)?;
    Some(rest[..end].trim())
}

/// Extract a JSON value from answer text.
///
/// A fenced ```` ```json ```` block wins; otherwise the whole text must be
/// JSON. Never panics on bad input.
pub fn extract_json(answer: &str) -> Result<serde_json::Value> {
    let candidate = fenced_json(answer).unwrap_or(answer).trim();
    if candidate.is_empty() {
        return Err(LeopardError::MalformedResponse {
            detail: "no JSON candidate in answer text".into(),
        });
    }

    serde_json::from_str(candidate).map_err(|e| LeopardError::MalformedResponse {
        detail: format!("answer is not JSON: {e}"),
    })
}
