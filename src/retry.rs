//! Retry with exponential backoff, and time bounds for external calls
//!
//! Completion calls and browser lookups both go through here; nothing else in
//! the crate retries.

use crate::config::RetryConfig;
use crate::error::{AgentsError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Retry policy for operations
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
    attempt: usize,
    next_delay: Duration,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            next_delay: config.initial_delay,
            config,
            attempt: 0,
        }
    }

    /// Check if we should retry
    pub fn should_retry(&self) -> bool {
        self.attempt < self.config.max_retries
    }

    /// Number of retries performed so far
    pub fn attempt(&self) -> usize {
        self.attempt
    }

    /// Calculate next delay with exponential backoff
    pub fn next_delay(&mut self) -> Duration {
        let mut delay = self.next_delay;

        if self.config.jitter {
            use rand::Rng;
            let jitter = rand::thread_rng().gen_range(0.0..0.3);
            let jitter_ms = (delay.as_millis() as f64 * jitter) as u64;
            delay += Duration::from_millis(jitter_ms);
        }

        self.attempt += 1;
        self.next_delay = Duration::from_secs_f32(
            (self.next_delay.as_secs_f32() * self.config.backoff_multiplier)
                .min(self.config.max_delay.as_secs_f32()),
        );

        delay
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

const TRANSIENT_API_MARKERS: [&str; 6] = [
    "rate_limit",
    "server_error",
    "unavailable",
    "overloaded",
    "resource_exhausted",
    "internal",
];

/// Determine if an error is worth another attempt
pub fn is_retryable(error: &AgentsError) -> bool {
    use async_openai::error::OpenAIError;

    match error {
        AgentsError::OpenAIError(OpenAIError::ApiError(api)) => is_transient_api_error(api),
        AgentsError::OpenAIError(inner) => matches!(
            inner,
            OpenAIError::Reqwest(_) | OpenAIError::StreamError(_)
        ),
        AgentsError::BrowserError(_) => true,
        AgentsError::IoError(_) => true,
        AgentsError::Timeout { .. } => true,
        AgentsError::ToolExecutionError { .. } => true,
        _ => false,
    }
}

/// API errors are retried only when the backend marks them as transient.
///
/// A body-less error (a 5xx the client could not parse) counts as transient;
/// rejected keys and malformed requests carry a type or code and fail at once.
fn is_transient_api_error(error: &async_openai::error::ApiError) -> bool {
    let labels = [error.r#type.as_deref(), error.code.as_deref()];
    if labels.iter().all(Option::is_none) {
        return true;
    }
    labels.iter().flatten().any(|label| {
        let label = label.to_lowercase();
        TRANSIENT_API_MARKERS
            .iter()
            .any(|marker| label.contains(marker))
    })
}

/// Retry an async operation with exponential backoff
pub async fn retry_async<F, Fut, T>(mut operation: F, policy: &mut RetryPolicy) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    loop {
        match operation().await {
            Ok(result) => {
                if policy.attempt() > 0 {
                    debug!(
                        "Operation succeeded after {} attempts",
                        policy.attempt() + 1
                    );
                }
                return Ok(result);
            }
            Err(error) => {
                if !is_retryable(&error) {
                    debug!("Non-retryable error: {}", error);
                    return Err(error);
                }

                if !policy.should_retry() {
                    warn!(
                        "Max retries ({}) exceeded. Last error: {}",
                        policy.config.max_retries, error
                    );
                    return Err(error);
                }

                let delay = policy.next_delay();
                warn!(
                    "Attempt {} failed: {}. Retrying in {:?}...",
                    policy.attempt(),
                    error,
                    delay
                );

                sleep(delay).await;
            }
        }
    }
}

/// Bound a future by `limit`, mapping expiry to [`AgentsError::Timeout`].
pub async fn with_timeout<Fut, T>(operation: &str, limit: Duration, fut: Fut) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(AgentsError::Timeout {
            operation: operation.to_string(),
        }),
    }
}
