//! Retry with linear backoff.
//!
//! Errors are `anyhow::Error` so the retry decision can ask whether the failure
//! is a [`FederationError`] at all: foreign errors are always retried, federation
//! errors only when `retryable` is set.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::FederationError;

/// Configuration for retry behavior.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_retries: u32,
    /// Base delay; attempt `n` waits `delay * n` before attempt `n + 1`
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    pub async fn run<T, F, Fut>(&self, operation: F) -> anyhow::Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        handle_with_retry(operation, self.max_retries, self.delay).await
    }
}

/// Whether `err` may be retried.
pub fn is_retryable(err: &anyhow::Error) -> bool {
    err.downcast_ref::<FederationError>()
        .map(|e| e.retryable)
        .unwrap_or(true)
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// `max_retries` attempts have been made. The last error is returned as-is.
pub async fn handle_with_retry<T, F, Fut>(
    mut operation: F,
    max_retries: u32,
    delay: Duration,
) -> anyhow::Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let mut attempt: u32 = 1;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let retryable = is_retryable(&err);
                warn!(
                    attempt,
                    max_retries,
                    retryable,
                    error = %err,
                    "Operation attempt failed"
                );
                if attempt >= max_retries || !retryable {
                    return Err(err);
                }
                tokio::time::sleep(delay * attempt).await;
                attempt += 1;
            }
        }
    }
}
