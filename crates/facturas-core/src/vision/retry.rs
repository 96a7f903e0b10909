//! Bounded retry with exponential backoff for rate-limited requests.

use std::future::Future;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use tracing::warn;

use crate::error::VisionError;
use crate::models::config::RetryConfig;

/// Retry policy applied to rate-limit errors only.
///
/// The delay before retry `n` (0-based) is `base_delay * 2^n`, optionally
/// jittered. Any other error is returned on the first attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    jitter: bool,
}

impl RetryPolicy {
    /// Create a policy with the given total attempts and base delay, without jitter.
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            jitter: false,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_attempts, Duration::from_secs(config.base_delay_secs))
            .with_jitter(config.jitter)
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    fn backoff(&self) -> ExponentialBuilder {
        let retries = self.max_attempts - 1;
        let backoff = ExponentialBuilder::default()
            .with_min_delay(self.base_delay)
            .with_max_delay(self.base_delay.saturating_mul(1u32 << retries.min(16)))
            .with_factor(2.0)
            .with_max_times(retries as usize);
        if self.jitter {
            backoff.with_jitter()
        } else {
            backoff
        }
    }

    /// Run `op` until it succeeds, fails with a non rate-limit error, or the
    /// attempts are exhausted. The last error is returned unchanged.
    pub async fn run<T, F, Fut>(&self, op: F) -> Result<T, VisionError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, VisionError>>,
    {
        let max_attempts = self.max_attempts;
        let mut attempt = 0;
        op.retry(self.backoff())
            .sleep(tokio::time::sleep)
            .when(VisionError::is_rate_limited)
            .notify(|err: &VisionError, delay: Duration| {
                attempt += 1;
                warn!(
                    "Rate limit hit (attempt {}/{}), retrying in {:.2}s: {}",
                    attempt,
                    max_attempts,
                    delay.as_secs_f64(),
                    err
                );
            })
            .await
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}
