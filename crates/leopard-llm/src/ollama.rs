use leopard_types::{LeopardError, Result};
use serde_json::json;

use crate::provider::decode_json_envelope;
use crate::{ProviderConfig, ProviderDialect};

/// Ollama `/api/generate`.
///
/// Ollama streams newline-delimited JSON unless told otherwise. The body is
/// left as `{model, prompt}` and the streamed chunks are folded back into a
/// single envelope once the full response has arrived.
#[derive(Debug, Clone, Copy, Default)]
pub struct OllamaDialect;

impl ProviderDialect for OllamaDialect {
    fn name(&self) -> &str {
        "ollama"
    }

    fn endpoint_path(&self, _config: &ProviderConfig) -> String {
        "/api/generate".to_string()
    }

    fn build_body(&self, config: &ProviderConfig, prompt: &str) -> serde_json::Value {
        json!({
            "model": config.model_name(),
            "prompt": prompt,
        })
    }

    fn decode_envelope(&self, raw: &str) -> Result<serde_json::Value> {
        if let Ok(envelope) = serde_json::from_str::<serde_json::Value>(raw) {
            return Ok(envelope);
        }

        let mut text = String::new();
        let mut model = None;
        for (idx, line) in raw.lines().map(str::trim).filter(|l| !l.is_empty()).enumerate() {
            let chunk = decode_json_envelope(line).map_err(|_| LeopardError::MalformedResponse {
                detail: format!("ollama stream chunk {idx} is not JSON"),
            })?;
            if let Some(piece) = chunk["response"].as_str() {
                text.push_str(piece);
            }
            if model.is_none() {
                model = chunk["model"].as_str().map(String::from);
            }
            if chunk["done"].as_bool() == Some(true) {
                break;
            }
        }

        if model.is_none() && text.is_empty() {
            return Err(LeopardError::MalformedResponse {
                detail: "ollama response body is empty".into(),
            });
        }

        Ok(json!({
            "model": model,
            "response": text,
            "done": true,
        }))
    }

    fn answer_text(&self, envelope: &serde_json::Value) -> Option<String> {
        envelope["response"].as_str().map(String::from)
    }
}
