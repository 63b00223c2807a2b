use serde_json::json;

use crate::provider::{DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE};
use crate::{ProviderConfig, ProviderDialect};

/// Legacy completion API (`/v1/completions`), as served by vLLM.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompletionsDialect;

impl ProviderDialect for CompletionsDialect {
    fn name(&self) -> &str {
        "completions"
    }

    fn endpoint_path(&self, _config: &ProviderConfig) -> String {
        "/v1/completions".to_string()
    }

    fn build_body(&self, config: &ProviderConfig, prompt: &str) -> serde_json::Value {
        json!({
            "model": config.model_name(),
            "prompt": prompt,
            "temperature": DEFAULT_TEMPERATURE,
            "max_tokens": DEFAULT_MAX_TOKENS,
        })
    }

    fn answer_text(&self, envelope: &serde_json::Value) -> Option<String> {
        envelope["choices"]
            .as_array()?
            .first()?
            .get("text")?
            .as_str()
            .map(String::from)
    }
}
