//! LLM inference client with pluggable provider dialects.
//!
//! Resolves a [`ProviderConfig`] from the environment and an optional YAML
//! file, builds the provider-specific request through a [`ProviderDialect`],
//! sends it with bounded retries, and extracts the JSON payload from the
//! model's answer. [`InferenceClient`] ties these together.

mod client;
mod completions;
pub mod config;
mod extract;
mod gemini;
mod ollama;
mod openai;
mod provider;
mod retry;
mod transport;

pub use client::InferenceClient;
pub use completions::CompletionsDialect;
pub use config::{ConfigSource, FileConfig, LoopbackRule, ProviderConfig, ProviderFileEntry};
pub use extract::{extract_json, fenced_json};
pub use gemini::GeminiDialect;
pub use ollama::OllamaDialect;
pub use openai::OpenAiDialect;
pub use provider::*;
pub use retry::{execute_with_retry, RetryPolicy};
pub use transport::{HttpTransport, Transport};

pub use leopard_types::{FailureKind, InferenceResult, LeopardError};
pub use tokio_util::sync::CancellationToken;
