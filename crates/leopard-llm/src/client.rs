use std::path::Path;
use std::sync::Arc;

use leopard_types::{InferenceResult, LeopardError, Result};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::{
    execute_with_retry, extract_json, ConfigSource, HttpTransport, PreparedRequest,
    ProviderConfig, ProviderDialect, ProviderRegistry, RetryPolicy, Transport,
};

// ---------------------------------------------------------------------------
// InferenceClient
// ---------------------------------------------------------------------------

/// Sends a prompt to the configured backend and returns the JSON payload
/// found in its answer.
///
/// The client holds no mutable state; concurrent calls share only the
/// immutable config, the dialect and the transport's connection pool.
pub struct InferenceClient {
    config: Arc<ProviderConfig>,
    registry: ProviderRegistry,
    dialect: Arc<dyn ProviderDialect>,
    transport: Arc<dyn Transport>,
    retry: RetryPolicy,
}

impl InferenceClient {
    pub fn new(config: ProviderConfig) -> Self {
        let registry = ProviderRegistry::with_builtins();
        let dialect = registry.resolve(config.provider_id());
        let retry = RetryPolicy::new(config.max_retries());

        let client = Self {
            config: Arc::new(config),
            registry,
            dialect,
            transport: Arc::new(HttpTransport::new()),
            retry,
        };
        client.warn_on_missing_key();
        client
    }

    /// Resolve configuration from the process environment (and the YAML
    /// file at `config_path` or `LLM_CONFIG_PATH`).
    pub fn from_env(provider: Option<&str>, config_path: Option<&Path>) -> Result<Self> {
        let source = ConfigSource::from_env(config_path)?;
        Ok(Self::new(ProviderConfig::resolve(provider, &source)?))
    }

    /// Replace the dialect registry and re-resolve the active dialect.
    pub fn with_registry(mut self, registry: ProviderRegistry) -> Self {
        self.dialect = registry.resolve(self.config.provider_id());
        self.registry = registry;
        self.warn_on_missing_key();
        self
    }

    pub fn with_transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Arc::new(transport);
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn dialect(&self) -> &dyn ProviderDialect {
        self.dialect.as_ref()
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// The request that would be sent for `prompt`.
    pub fn prepare(&self, prompt: &str) -> PreparedRequest {
        PreparedRequest::build(self.dialect.as_ref(), &self.config, prompt)
    }

    pub async fn infer(&self, prompt: &str) -> InferenceResult {
        self.infer_with_cancel(prompt, &CancellationToken::new())
            .await
    }

    pub async fn infer_with_cancel(
        &self,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> InferenceResult {
        self.try_infer(prompt, cancel).await.into()
    }

    /// [`infer`](Self::infer) rendered as indented JSON: the payload, or
    /// `{"error": message}`.
    pub async fn infer_json(&self, prompt: &str) -> String {
        self.infer(prompt).await.to_pretty_json()
    }

    /// Typed variant of [`infer_with_cancel`](Self::infer_with_cancel).
    pub async fn try_infer(
        &self,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value> {
        let span = tracing::info_span!(
            "inference",
            call_id = %uuid::Uuid::new_v4(),
            provider = %self.config.provider_id(),
            model = %self.config.model_name(),
        );
        self.run(prompt, cancel).instrument(span).await
    }

    async fn run(&self, prompt: &str, cancel: &CancellationToken) -> Result<serde_json::Value> {
        let provider = self.config.provider_id();
        if self.config.base_url().is_empty() {
            tracing::error!("No LLM base URL configured");
            return Err(LeopardError::MissingBaseUrl {
                provider: provider.to_string(),
            });
        }

        let request = self.prepare(prompt);
        let url = request.url(self.config.base_url());
        tracing::debug!(
            dialect = self.dialect.name(),
            path = request.redacted_path(),
            prompt_chars = prompt.len(),
            "Prepared LLM request"
        );

        let raw = execute_with_retry(
            |_| {
                self.transport
                    .send(provider, &url, &request, self.config.timeout())
            },
            &self.retry,
            cancel,
            provider,
        )
        .await?;

        let envelope = self.dialect.decode_envelope(&raw).inspect_err(|e| {
            tracing::error!(error = ?e, "LLM response body could not be decoded");
        })?;

        let answer = match self.dialect.answer_text(&envelope) {
            Some(text) if !text.trim().is_empty() => text,
            _ => {
                tracing::error!("Empty response from LLM");
                return Err(LeopardError::EmptyResponse);
            }
        };

        extract_json(&answer).inspect_err(|e| {
            tracing::error!(error = ?e, answer_chars = answer.len(), "Invalid JSON received from LLM");
        })
    }

    fn warn_on_missing_key(&self) {
        if self.dialect.requires_api_key() && !self.config.has_api_key() {
            tracing::warn!(
                provider = %self.config.provider_id(),
                "No LLM API key provided, the endpoint may require authentication"
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
