//! Bounded retry with a fixed, cancellable backoff.

use std::future::Future;
use std::time::Duration;

use leopard_types::{LeopardError, Result};
use tokio_util::sync::CancellationToken;

/// How many attempts to make and how long to pause between them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(5);

    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff: Self::DEFAULT_BACKOFF,
        }
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_MAX_RETRIES)
    }
}

/// Run `f` until it succeeds, fails with a non-retryable error, or
/// `policy.max_attempts` attempts have failed.
///
/// `f` receives the 1-based attempt number. Both the attempt and the pause
/// after it race against `cancel`; a cancelled token drops the in-flight
/// attempt and returns [`LeopardError::Cancelled`].
pub async fn execute_with_retry<F, Fut, T>(
    mut f: F,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    provider: &str,
) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);

    for attempt in 1..=max_attempts {
        if cancel.is_cancelled() {
            return Err(LeopardError::Cancelled);
        }

        tracing::info!(provider = %provider, attempt, max_attempts, "Sending LLM request");
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(LeopardError::Cancelled),
            r = f(attempt) => r,
        };

        match outcome {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() => {
                tracing::warn!(
                    provider = %provider,
                    attempt,
                    max_attempts,
                    error = %e,
                    "LLM request attempt failed"
                );
                if attempt < max_attempts {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(LeopardError::Cancelled),
                        _ = tokio::time::sleep(policy.backoff) => {}
                    }
                }
            }
            Err(e) => return Err(e),
        }
    }

    tracing::error!(provider = %provider, attempts = max_attempts, "LLM request failed after retries");
    Err(LeopardError::RetriesExhausted {
        provider: provider.to_string(),
        attempts: max_attempts,
    })
}
