use std::collections::HashMap;
use std::sync::Arc;

use leopard_types::{LeopardError, Result};
use secrecy::ExposeSecret;

use crate::{CompletionsDialect, GeminiDialect, OllamaDialect, OpenAiDialect, ProviderConfig};

/// System instruction sent with chat-style requests so the model answers
/// with bare JSON.
pub const JSON_ONLY_INSTRUCTION: &str = "Return only JSON output. No explanations.";

pub const DEFAULT_TEMPERATURE: f64 = 0.1;
pub const DEFAULT_MAX_TOKENS: u32 = 1000;

// ---------------------------------------------------------------------------
// ProviderDialect
// ---------------------------------------------------------------------------

/// Request/response shape of one backend API.
///
/// Everything here is pure: no I/O happens in a dialect.
pub trait ProviderDialect: Send + Sync {
    fn name(&self) -> &str;

    /// Path appended to the base URL, including any query string.
    fn endpoint_path(&self, config: &ProviderConfig) -> String;

    fn build_body(&self, config: &ProviderConfig, prompt: &str) -> serde_json::Value;

    /// Decode the raw HTTP body into the backend's JSON envelope.
    fn decode_envelope(&self, raw: &str) -> Result<serde_json::Value> {
        decode_json_envelope(raw)
    }

    /// Plain answer text from the envelope, `None` when the backend
    /// returned nothing usable.
    fn answer_text(&self, envelope: &serde_json::Value) -> Option<String>;

    fn requires_api_key(&self) -> bool {
        false
    }
}

pub fn decode_json_envelope(raw: &str) -> Result<serde_json::Value> {
    serde_json::from_str(raw).map_err(|e| LeopardError::MalformedResponse {
        detail: format!("response body is not JSON: {e}"),
    })
}

// ---------------------------------------------------------------------------
// PreparedRequest
// ---------------------------------------------------------------------------

/// Endpoint path, body and headers for one call.
#[derive(Clone, PartialEq)]
pub struct PreparedRequest {
    pub path: String,
    pub body: serde_json::Value,
    pub headers: Vec<(String, String)>,
}

impl PreparedRequest {
    pub fn build(dialect: &dyn ProviderDialect, config: &ProviderConfig, prompt: &str) -> Self {
        let mut headers = vec![("Content-Type".to_string(), "application/json".to_string())];
        if let Some(key) = config.api_key() {
            headers.push((
                "Authorization".to_string(),
                format!("Bearer {}", key.expose_secret()),
            ));
        }

        Self {
            path: dialect.endpoint_path(config),
            body: dialect.build_body(config, prompt),
            headers,
        }
    }

    pub fn url(&self, base_url: &str) -> String {
        format!("{base_url}{}", self.path)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Path with any query string hidden, safe to log.
    pub fn redacted_path(&self) -> &str {
        self.path.split('?').next().unwrap_or(&self.path)
    }
}

impl std::fmt::Debug for PreparedRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let headers: Vec<&str> = self.headers.iter().map(|(k, _)| k.as_str()).collect();
        f.debug_struct("PreparedRequest")
            .field("path", &self.redacted_path())
            .field("body", &self.body)
            .field("headers", &headers)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// ProviderRegistry
// ---------------------------------------------------------------------------

/// Maps provider ids to dialects. Ids that are not registered fall back to
/// the OpenAI-compatible chat dialect.
pub struct ProviderRegistry {
    dialects: HashMap<String, Arc<dyn ProviderDialect>>,
    fallback: Arc<dyn ProviderDialect>,
}

impl ProviderRegistry {
    /// Empty registry: every id resolves to the fallback.
    pub fn new() -> Self {
        Self {
            dialects: HashMap::new(),
            fallback: Arc::new(OpenAiDialect),
        }
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("vllm", CompletionsDialect);
        registry.register("ollama", OllamaDialect);
        registry.register("gemini", GeminiDialect);
        registry.register("granite", GeminiDialect);
        registry.register("openai", OpenAiDialect);
        registry
    }

    pub fn register(&mut self, id: &str, dialect: impl ProviderDialect + 'static) {
        self.dialects
            .insert(id.trim().to_lowercase(), Arc::new(dialect));
    }

    pub fn with_fallback(mut self, dialect: impl ProviderDialect + 'static) -> Self {
        self.fallback = Arc::new(dialect);
        self
    }

    pub fn is_registered(&self, id: &str) -> bool {
        self.dialects.contains_key(&id.trim().to_lowercase())
    }

    pub fn resolve(&self, id: &str) -> Arc<dyn ProviderDialect> {
        match self.dialects.get(&id.trim().to_lowercase()) {
            Some(dialect) => dialect.clone(),
            None => {
                tracing::debug!(
                    provider = %id,
                    fallback = self.fallback.name(),
                    "Provider not registered, using fallback dialect"
                );
                self.fallback.clone()
            }
        }
    }

    /// Registered ids, sorted.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.dialects.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
