use std::time::Duration;

use async_trait::async_trait;
use leopard_types::{LeopardError, Result};

use crate::PreparedRequest;

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// Sends one prepared request and returns the raw response body.
///
/// Network failures and non-2xx statuses come back as retryable errors
/// (`Network` / `HttpStatus`); retrying is the caller's business.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        provider: &str,
        url: &str,
        request: &PreparedRequest,
        timeout: Duration,
    ) -> Result<String>;
}

// ---------------------------------------------------------------------------
// HttpTransport
// ---------------------------------------------------------------------------

/// `reqwest`-backed transport. The inner client keeps its connection pool
/// across calls.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        provider: &str,
        url: &str,
        request: &PreparedRequest,
        timeout: Duration,
    ) -> Result<String> {
        let mut builder = self.client.post(url).timeout(timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let resp = builder
            .json(&request.body)
            .send()
            .await
            .map_err(|e| network_error(provider, e))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| network_error(provider, e))?;

        if !status.is_success() {
            return Err(LeopardError::HttpStatus {
                provider: provider.to_string(),
                status: status.as_u16(),
                message: extract_error_message(&body),
            });
        }

        Ok(body)
    }
}

fn network_error(provider: &str, e: reqwest::Error) -> LeopardError {
    // Some dialects carry the API key in the query string.
    let e = e.without_url();
    let message = if e.is_timeout() {
        format!("timed out: {e}")
    } else {
        e.to_string()
    };
    LeopardError::Network {
        provider: provider.to_string(),
        message,
    }
}

/// Pull `error.message` (or a plain `error` string) out of an error body.
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| match &v["error"] {
            serde_json::Value::String(s) => Some(s.clone()),
            other => other["message"].as_str().map(String::from),
        })
        .unwrap_or_else(|| body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_from_openai_body() {
        let body = r#"{"error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}}"#;
        assert_eq!(extract_error_message(body), "Incorrect API key provided");
    }

    #[test]
    fn error_message_from_ollama_body() {
        let body = r#"{"error": "model 'mistral' not found"}"#;
        assert_eq!(extract_error_message(body), "model 'mistral' not found");
    }

    #[test]
    fn error_message_falls_back_to_raw_body() {
        assert_eq!(extract_error_message("Bad Gateway"), "Bad Gateway");
    }
}
