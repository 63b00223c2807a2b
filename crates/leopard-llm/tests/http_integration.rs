//! End-to-end tests for the inference client over real HTTP.
//!
//! Each test starts a wiremock server, points a `ProviderConfig` at it and
//! runs a full inference: request construction -> transport -> retry ->
//! envelope decoding -> JSON extraction.

use std::time::Duration;

use leopard_llm::{
    CancellationToken, ConfigSource, FailureKind, InferenceClient, InferenceResult,
    ProviderConfig, RetryPolicy,
};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Client against `server` with a short backoff so retries stay fast.
fn client_for(server: &MockServer, provider: &str) -> InferenceClient {
    let config = ProviderConfig::new(provider, server.uri()).with_model("test-model");
    InferenceClient::new(config).with_retry_policy(RetryPolicy::new(3).with_backoff(Duration::from_millis(10)))
}

fn chat_completion(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-123",
        "object": "chat.completion",
        "model": "test-model",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }]
    })
}

async fn request_count(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .map(|r| r.len())
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn openai_compatible_fenced_answer() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("Content-Type", "application/json"))
        .and(body_json(json!({
            "model": "test-model",
            "messages": [
                { "role": "system", "content": "Return only JSON output. No explanations." },
                { "role": "user", "content": "ping" }
            ],
            "max_tokens": 1000,
            "temperature": 0.1
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(chat_completion("```json\n{\"seconds\":5}\n```")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let result = client_for(&server, "openai").infer("ping").await;
    assert_eq!(result, InferenceResult::Success(json!({ "seconds": 5 })));
}

#[tokio::test]
async fn bearer_token_sent_when_key_present() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("Authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_completion("{\"ok\": true}")))
        .expect(1)
        .mount(&server)
        .await;

    let config = ProviderConfig::new("openai", server.uri()).with_api_key("sk-test");
    let result = InferenceClient::new(config).infer("ping").await;
    assert_eq!(result.payload(), Some(&json!({ "ok": true })));
}

#[tokio::test]
async fn server_errors_retried_until_success() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .up_to_n_times(2)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_completion(
            "{\"seconds\": 9.6, \"reasoning\": \"155 m at 58 km/h\"}",
        )))
        .mount(&server)
        .await;

    let result = client_for(&server, "openai").infer("ping").await;
    assert!(result.is_success(), "unexpected result: {result:?}");
    assert_eq!(result.payload().unwrap()["seconds"], 9.6);
    assert_eq!(request_count(&server).await, 3);
}

#[tokio::test]
async fn persistent_failure_exhausts_retries() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let result = client_for(&server, "openai").infer("ping").await;
    assert_eq!(
        result,
        InferenceResult::failure(FailureKind::TransientError, "request failed after retries")
    );
    assert_eq!(request_count(&server).await, 3);
}

#[tokio::test]
async fn completion_style_backend() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/completions"))
        .and(body_json(json!({
            "model": "test-model",
            "prompt": "ping",
            "temperature": 0.1,
            "max_tokens": 1000
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "object": "text_completion",
            "choices": [{ "index": 0, "text": "\n{\"a\": 1}" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let result = client_for(&server, "vllm").infer("ping").await;
    assert_eq!(result.payload(), Some(&json!({ "a": 1 })));
}

#[tokio::test]
async fn ollama_streamed_body() {
    let server = MockServer::start().await;

    let ndjson = concat!(
        "{\"model\":\"test-model\",\"response\":\"{\\\"a\\\"\",\"done\":false}\n",
        "{\"model\":\"test-model\",\"response\":\": 1}\",\"done\":false}\n",
        "{\"model\":\"test-model\",\"response\":\"\",\"done\":true}\n",
    );

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_json(json!({ "model": "test-model", "prompt": "ping" })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(ndjson, "application/x-ndjson"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let result = client_for(&server, "ollama").infer("ping").await;
    assert_eq!(result.payload(), Some(&json!({ "a": 1 })));
}

#[tokio::test]
async fn gemini_key_in_query() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/models/gemini-2.5-flash:generateContent"))
        .and(query_param("key", "g-key"))
        .and(body_json(json!({ "contents": [{ "parts": [{ "text": "ping" }] }] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": { "parts": [{ "text": "```json\n{\"b\": 2}\n```" }], "role": "model" },
                "finishReason": "STOP"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = ProviderConfig::new("gemini", server.uri())
        .with_model("gemini-2.5-flash")
        .with_api_key("g-key");
    let result = InferenceClient::new(config).infer("ping").await;
    assert_eq!(result.payload(), Some(&json!({ "b": 2 })));
}

#[tokio::test]
async fn html_body_is_malformed_without_retry() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let result = client_for(&server, "openai").infer("ping").await;
    assert_eq!(result.kind(), Some(FailureKind::MalformedResponse));
    assert_eq!(request_count(&server).await, 1);
}

#[tokio::test]
async fn slow_backend_times_out_and_retries() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(chat_completion("{}"))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let config = ProviderConfig::new("openai", server.uri()).with_timeout(Duration::from_millis(100));
    let client = InferenceClient::new(config)
        .with_retry_policy(RetryPolicy::new(2).with_backoff(Duration::from_millis(10)));

    let result = client.infer("ping").await;
    assert_eq!(result.kind(), Some(FailureKind::TransientError));
    assert_eq!(request_count(&server).await, 2);
}

#[tokio::test]
async fn cancellation_aborts_in_flight_request() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(chat_completion("{}"))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let client = client_for(&server, "openai");
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let started = std::time::Instant::now();
    let result = client.infer_with_cancel("ping", &cancel).await;
    assert_eq!(
        result,
        InferenceResult::failure(FailureKind::Cancelled, "inference cancelled")
    );
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn resolved_from_config_source() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_json(json!({
            "model": "env-model",
            "messages": [
                { "role": "system", "content": "Return only JSON output. No explanations." },
                { "role": "user", "content": "ping" }
            ],
            "max_tokens": 1000,
            "temperature": 0.1
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_completion("{\"c\": 3}")))
        .expect(1)
        .mount(&server)
        .await;

    let base_url = format!("{}/", server.uri());
    let source = ConfigSource::new(
        [
            ("LLM_PROVIDER", "openai"),
            ("OPENAI_BASE_URL", base_url.as_str()),
            ("OPENAI_MODEL", "env-model"),
        ],
        None,
    );
    let config = ProviderConfig::resolve(None, &source).unwrap();
    let result = InferenceClient::new(config).infer("ping").await;
    assert_eq!(result.payload(), Some(&json!({ "c": 3 })));
}
