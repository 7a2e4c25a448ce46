//! Retry with exponential back-off and jitter for upstream generator calls.
//!
//! Only transient failures are retried: timeouts, connection errors, HTTP 429
//! and 5xx. Malformed payloads and client errors fail on the first attempt.
//! An upstream `Retry-After` (delta-seconds) replaces the computed delay.

use std::future::Future;
use std::time::Duration;

use crate::error::GeneratorError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_base_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff_base_ms: 500,
        }
    }
}

pub(crate) fn is_retriable(err: &GeneratorError) -> bool {
    match err {
        GeneratorError::Http(e) => {
            e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
        }
        GeneratorError::Status { status, .. } => *status == 429 || *status >= 500,
        GeneratorError::Deserialize { .. }
        | GeneratorError::EmptyCompletion
        | GeneratorError::NotCovered(_)
        | GeneratorError::NoPosition
        | GeneratorError::Config(_) => false,
    }
}

/// Upper bound on any single wait, including a server-sent `Retry-After`.
const MAX_DELAY: Duration = Duration::from_secs(30);

impl RetryPolicy {
    /// How long to wait before retry number `retry` (1-based) after `err`.
    ///
    /// A `Retry-After` hint from the upstream wins over the computed
    /// back-off of `backoff_base_ms × 2ⁿ⁻¹` with ±25 % jitter. Both are
    /// capped at 30 s.
    pub(crate) fn delay_before(&self, retry: u32, err: &GeneratorError) -> Duration {
        if let GeneratorError::Status {
            retry_after: Some(hint),
            ..
        } = err
        {
            return (*hint).min(MAX_DELAY);
        }
        let exponent = retry.saturating_sub(1).min(10);
        let base = Duration::from_millis(self.backoff_base_ms.saturating_mul(1u64 << exponent));
        base.min(MAX_DELAY).mul_f64(rand::random::<f64>() * 0.5 + 0.75)
    }
}

/// Runs `operation`, retrying transient errors up to `policy.max_retries` times.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    policy: RetryPolicy,
    mut operation: F,
) -> Result<T, GeneratorError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, GeneratorError>>,
{
    let mut retry = 0u32;
    let err = loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        if retry == policy.max_retries || !is_retriable(&err) {
            break err;
        }
        retry += 1;
        let delay = policy.delay_before(retry, &err);
        tracing::warn!(
            retry,
            max_retries = policy.max_retries,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %err,
            "generator transient error; retrying"
        );
        tokio::time::sleep(delay).await;
    };
    if retry > 0 {
        tracing::debug!(retries = retry, "generator gave up");
    }
    Err(err)
}

/// Seconds form of an HTTP `Retry-After` header. HTTP-date values are ignored.
pub(crate) fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}
