//! Exponential backoff for transient provider failures.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Retry behaviour of the completion gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    /// Add up to 25% random jitter to each delay
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    #[must_use]
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    #[must_use]
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Policy without any waiting, for tests.
    #[must_use]
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new()
            .with_max_attempts(max_attempts)
            .with_initial_delay(Duration::ZERO)
            .with_max_delay(Duration::ZERO)
            .with_jitter(false)
    }

    /// Delay after the given (1-based) failed attempt. Never exceeds `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let max_ms = self.max_delay.as_millis() as u64;
        let base_ms = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        let capped_ms = base_ms.min(max_ms as f64) as u64;

        let jitter_ms = if self.jitter && capped_ms >= 4 {
            rand::rng().random_range(0..=capped_ms / 4)
        } else {
            0
        };

        Duration::from_millis((capped_ms + jitter_ms).min(max_ms))
    }
}

/// Final failure of a retried operation.
#[derive(Debug)]
pub struct RetryError<E> {
    pub last_error: E,
    pub attempts: u32,
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// the policy's attempt cap is hit. `on_retry` sees every error that will be
/// retried.
pub async fn retry_with_backoff<T, E, F, Fut, R, N>(
    policy: &RetryPolicy,
    mut operation: F,
    is_retryable: R,
    mut on_retry: N,
) -> Result<(T, u32), RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
    N: FnMut(&E),
    E: std::fmt::Display,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(attempt, "Operation succeeded after retry");
                }
                return Ok((value, attempt));
            }
            Err(e) if attempt < policy.max_attempts && is_retryable(&e) => {
                let delay = policy.delay_for(attempt);
                warn!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Remote call failed, retrying"
                );
                on_retry(&e);
                sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                return Err(RetryError {
                    last_error: e,
                    attempts: attempt,
                });
            }
        }
    }
}
