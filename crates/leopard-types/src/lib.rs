//! Shared error taxonomy and result types for the Leopard inference client.
//!
//! This crate provides the foundational types used across the other Leopard crates:
//! - `LeopardError`: unified error type for config, transport and parsing failures
//! - `FailureKind`: the caller-facing classification of a failure
//! - `InferenceResult`: the value every inference call produces

use serde::{Deserialize, Serialize};

/// Unified error type for all Leopard subsystems.
#[derive(Debug, thiserror::Error)]
pub enum LeopardError {
    // === Configuration Errors ===
    #[error("missing base URL")]
    MissingBaseUrl { provider: String },

    #[error("configuration error: {0}")]
    Configuration(String),

    // === Transport Errors (per attempt) ===
    #[error("Provider {provider} returned HTTP {status}: {message}")]
    HttpStatus {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("Request to {provider} failed: {message}")]
    Network { provider: String, message: String },

    #[error("request failed after retries")]
    RetriesExhausted { provider: String, attempts: u32 },

    // === Response Errors ===
    #[error("empty response from LLM")]
    EmptyResponse,

    #[error("invalid JSON received from LLM")]
    MalformedResponse { detail: String },

    #[error("inference cancelled")]
    Cancelled,

    // === Generic ===
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LeopardError {
    /// Returns `true` if the error is transient and the request may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LeopardError::HttpStatus { .. } | LeopardError::Network { .. }
        )
    }

    /// Classifies the error for callers that branch on the failure kind.
    pub fn kind(&self) -> FailureKind {
        match self {
            LeopardError::MissingBaseUrl { .. }
            | LeopardError::Configuration(_)
            | LeopardError::Io(_) => FailureKind::ConfigurationError,
            LeopardError::HttpStatus { .. }
            | LeopardError::Network { .. }
            | LeopardError::RetriesExhausted { .. } => FailureKind::TransientError,
            LeopardError::EmptyResponse => FailureKind::EmptyResponse,
            LeopardError::MalformedResponse { .. } | LeopardError::Json(_) => {
                FailureKind::MalformedResponse
            }
            LeopardError::Cancelled => FailureKind::Cancelled,
        }
    }
}

/// A convenience alias for `Result<T, LeopardError>`.
pub type Result<T> = std::result::Result<T, LeopardError>;

// ---------------------------------------------------------------------------
// FailureKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    ConfigurationError,
    TransientError,
    EmptyResponse,
    MalformedResponse,
    Cancelled,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FailureKind::ConfigurationError => "configuration_error",
            FailureKind::TransientError => "transient_error",
            FailureKind::EmptyResponse => "empty_response",
            FailureKind::MalformedResponse => "malformed_response",
            FailureKind::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// InferenceResult
// ---------------------------------------------------------------------------

/// Outcome of one inference call. Produced atomically once the backend
/// response (or the final failure) is known.
#[derive(Debug, Clone, PartialEq)]
pub enum InferenceResult {
    /// JSON payload extracted from the model's answer text.
    Success(serde_json::Value),
    Failure { kind: FailureKind, message: String },
}

impl InferenceResult {
    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        InferenceResult::Failure {
            kind,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, InferenceResult::Success(_))
    }

    pub fn payload(&self) -> Option<&serde_json::Value> {
        match self {
            InferenceResult::Success(v) => Some(v),
            InferenceResult::Failure { .. } => None,
        }
    }

    pub fn kind(&self) -> Option<FailureKind> {
        match self {
            InferenceResult::Success(_) => None,
            InferenceResult::Failure { kind, .. } => Some(*kind),
        }
    }

    /// The caller-facing JSON value: the payload itself, or `{"error": message}`.
    pub fn to_value(&self) -> serde_json::Value {
        match self {
            InferenceResult::Success(v) => v.clone(),
            InferenceResult::Failure { message, .. } => serde_json::json!({ "error": message }),
        }
    }

    /// Indented rendering of [`to_value`](Self::to_value). Object keys keep
    /// the order in which the backend produced them.
    pub fn to_pretty_json(&self) -> String {
        let value = self.to_value();
        serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string())
    }
}

impl From<Result<serde_json::Value>> for InferenceResult {
    fn from(result: Result<serde_json::Value>) -> Self {
        match result {
            Ok(v) => InferenceResult::Success(v),
            Err(e) => InferenceResult::Failure {
                kind: e.kind(),
                message: e.to_string(),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
