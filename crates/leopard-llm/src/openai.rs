use serde_json::json;

use crate::provider::{DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE, JSON_ONLY_INSTRUCTION};
use crate::{ProviderConfig, ProviderDialect};

// ---------------------------------------------------------------------------
// OpenAiDialect
// ---------------------------------------------------------------------------

/// OpenAI-compatible `/v1/chat/completions`. Also the fallback for
/// unregistered provider ids.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenAiDialect;

impl ProviderDialect for OpenAiDialect {
    fn name(&self) -> &str {
        "openai"
    }

    fn endpoint_path(&self, _config: &ProviderConfig) -> String {
        "/v1/chat/completions".to_string()
    }

    fn build_body(&self, config: &ProviderConfig, prompt: &str) -> serde_json::Value {
        json!({
            "model": config.model_name(),
            "messages": [
                { "role": "system", "content": JSON_ONLY_INSTRUCTION },
                { "role": "user", "content": prompt }
            ],
            "max_tokens": DEFAULT_MAX_TOKENS,
            "temperature": DEFAULT_TEMPERATURE,
        })
    }

    fn answer_text(&self, envelope: &serde_json::Value) -> Option<String> {
        envelope["choices"]
            .as_array()?
            .first()?
            .get("message")?
            .get("content")?
            .as_str()
            .map(String::from)
    }

    fn requires_api_key(&self) -> bool {
        true
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
