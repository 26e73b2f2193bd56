//! Blanket retry with exponential backoff for TestRail calls.
//!
//! Every error is retried; there is no distinction between transient and
//! fatal failures.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::AppResult;

/// Retry policy for [`robust_api_call`].
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total number of attempts (not additional retries)
    pub max_retries: u32,
    /// Delay after the first failure; doubles after each subsequent one
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delay before attempt `attempt + 1`, i.e. `base_delay * 2^attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Invoke `call` until it succeeds or `policy.max_retries` attempts have
/// failed, sleeping `base_delay * 2^i` between attempts. Returns the last
/// error when every attempt fails.
pub async fn robust_api_call<T, F, Fut>(
    policy: RetryPolicy,
    description: &str,
    mut call: F,
) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let attempts = policy.max_retries.max(1);
    let mut attempt = 0;

    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt + 1 < attempts => {
                let delay = policy.delay_for(attempt);
                warn!(
                    "{} failed (attempt {}/{}): {}; retrying in {:?}",
                    description,
                    attempt + 1,
                    attempts,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                warn!("{} failed after {} attempts: {}", description, attempts, e);
                return Err(e);
            }
        }
    }
}
