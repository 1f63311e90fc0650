//! Unified backoff policy
//!
//! One abstraction serves both sleep-then-retry paths in the pipeline:
//! transaction retries on store contention (exponential growth) and the
//! recognition call budget's cooldown (fixed delay).

use std::time::Duration;
use tokio::time::sleep;

/// Bounded retry schedule: `max_attempts` tries, delay growing by
/// doubling from `base_delay` (or fixed when constructed with `fixed`).
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// When false the delay does not grow between attempts
    pub exponential: bool,
}

impl BackoffPolicy {
    pub fn exponential(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            exponential: true,
        }
    }

    /// Fixed-delay schedule, used for service cooldown pauses
    pub fn fixed(delay: Duration) -> Self {
        Self {
            max_attempts: 1,
            base_delay: delay,
            exponential: false,
        }
    }

    /// Delay before retry number `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if !self.exponential {
            return self.base_delay;
        }
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1)).min(64);
        self.base_delay.saturating_mul(factor)
    }

    pub async fn pause(&self, attempt: u32) {
        sleep(self.delay_for(attempt)).await;
    }
}

/// Retry `operation` under `policy` while `retryable` holds for the error.
///
/// Non-retryable errors and exhaustion both surface the last error.
pub async fn retry_with<T, E, F, Fut>(
    policy: &BackoffPolicy,
    operation_name: &str,
    retryable: impl Fn(&E) -> bool,
    mut operation: F,
) -> std::result::Result<T, E>
where
    E: std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = std::result::Result<T, E>>,
{
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::debug!(
                        operation = operation_name,
                        attempt,
                        "Operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(err) => {
                if !retryable(&err) || attempt >= policy.max_attempts {
                    if attempt > 1 {
                        tracing::error!(
                            operation = operation_name,
                            attempt,
                            error = %err,
                            "Operation failed, retries exhausted"
                        );
                    }
                    return Err(err);
                }

                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    backoff_ms = delay.as_millis() as u64,
                    error = %err,
                    "Transient failure, will retry after backoff"
                );
                sleep(delay).await;
            }
        }
    }
}
