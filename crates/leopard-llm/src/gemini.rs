use secrecy::ExposeSecret;
use serde_json::json;

use crate::{ProviderConfig, ProviderDialect};

// ---------------------------------------------------------------------------
// GeminiDialect
// ---------------------------------------------------------------------------

/// `generateContent` API. The key travels in the URL query string.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeminiDialect;

impl ProviderDialect for GeminiDialect {
    fn name(&self) -> &str {
        "gemini"
    }

    fn endpoint_path(&self, config: &ProviderConfig) -> String {
        match config.api_key() {
            Some(key) => format!(
                "/models/{}:generateContent?key={}",
                config.model_name(),
                key.expose_secret()
            ),
            None => format!("/models/{}:generateContent", config.model_name()),
        }
    }

    fn build_body(&self, _config: &ProviderConfig, prompt: &str) -> serde_json::Value {
        json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        })
    }

    fn answer_text(&self, envelope: &serde_json::Value) -> Option<String> {
        let parts = envelope["candidates"]
            .as_array()?
            .first()?
            .get("content")?
            .get("parts")?
            .as_array()?;

        let text: String = parts
            .iter()
            .filter_map(|p| p["text"].as_str())
            .collect();
        Some(text)
    }

    fn requires_api_key(&self) -> bool {
        true
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_in_query_string() {
        let config = ProviderConfig::new("gemini", "https://generativelanguage.googleapis.com/v1beta")
            .with_model("gemini-2.5-flash")
            .with_api_key("test-google-key");
        assert_eq!(
            GeminiDialect.endpoint_path(&config),
            "/models/gemini-2.5-flash:generateContent?key=test-google-key"
        );
    }

    #[test]
    fn no_query_without_key() {
        let config = ProviderConfig::new("granite", "http://granite.local").with_model("granite-13b");
        assert_eq!(
            GeminiDialect.endpoint_path(&config),
            "/models/granite-13b:generateContent"
        );
    }

    #[test]
    fn body_has_no_chat_roles() {
        let config = ProviderConfig::new("gemini", "http://g.local");
        assert_eq!(
            GeminiDialect.build_body(&config, "ping"),
            json!({ "contents": [{ "parts": [{ "text": "ping" }] }] })
        );
    }

    #[test]
    fn answer_joins_parts() {
        let envelope = json!({
            "candidates": [{
                "content": {
                    "parts": [{ "text": "```json\n{\"a\":" }, { "text": "1}\n```" }],
                    "role": "model"
                },
                "finishReason": "STOP"
            }]
        });
        assert_eq!(
            GeminiDialect.answer_text(&envelope).as_deref(),
            Some("```json\n{\"a\":1}\n```")
        );
    }

    #[test]
    fn answer_missing_candidates() {
        assert_eq!(GeminiDialect.answer_text(&json!({ "candidates": [] })), None);
        assert_eq!(GeminiDialect.answer_text(&json!({ "promptFeedback": {} })), None);
    }
}
