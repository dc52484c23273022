use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::error::ModelError;

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1_000);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay before retry number `retry_index` (zero based). Never shorter
    /// than `previous`, so the sequence is non-decreasing even with jitter.
    pub fn delay_for(&self, retry_index: u32, previous: Duration) -> Duration {
        let base_ms = duration_millis(self.base_delay);
        let max_ms = duration_millis(self.max_delay);
        let multiplier = 1u64.checked_shl(retry_index.min(63)).unwrap_or(u64::MAX);
        let exponential_ms = base_ms.saturating_mul(multiplier).min(max_ms);
        let jitter_ms = if self.jitter && exponential_ms >= 2 {
            rand::thread_rng().gen_range(0..exponential_ms / 2)
        } else {
            0
        };
        let delay = Duration::from_millis(exponential_ms.saturating_add(jitter_ms));
        delay.max(previous)
    }
}

/// Runs `operation` until it succeeds, `should_retry` rejects the error, or
/// `max_retries` retries have been spent. The last error is returned as is.
pub async fn retry_with_backoff<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    should_retry: P,
    mut operation: F,
) -> Result<T, E>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    let mut retries_used = 0u32;
    let mut previous_delay = Duration::ZERO;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                if retries_used >= policy.max_retries || !should_retry(&error) {
                    return Err(error);
                }
                let delay = policy.delay_for(retries_used, previous_delay);
                warn!(
                    attempt = retries_used + 1,
                    max_retries = policy.max_retries,
                    delay_ms = duration_millis(delay),
                    "inference attempt failed, retrying: {error}"
                );
                tokio::time::sleep(delay).await;
                previous_delay = delay;
                retries_used += 1;
            }
        }
    }
}

/// [`retry_with_backoff`] for transient [`ModelError`]s under one overall
/// deadline. When the deadline passes the pending attempt is dropped and no
/// further attempt is made.
pub async fn retry_with_deadline<T, F, Fut>(
    policy: &RetryPolicy,
    deadline: Duration,
    operation: F,
) -> Result<T, ModelError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ModelError>>,
{
    match tokio::time::timeout(
        deadline,
        retry_with_backoff(policy, ModelError::is_transient, operation),
    )
    .await
    {
        Ok(result) => result,
        Err(_) => {
            let timeout_ms = duration_millis(deadline);
            warn!(timeout_ms, "inference deadline elapsed");
            Err(ModelError::inference_timeout(timeout_ms))
        }
    }
}

fn duration_millis(duration: Duration) -> u64 {
    duration.as_millis().min(u64::MAX as u128) as u64
}
