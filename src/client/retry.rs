//! Exponential backoff retry.

use std::future::Future;
use std::time::Duration;

use crate::error::{AppError, Result};
use crate::models::RetryConfig;

/// Retry schedule derived from [`RetryConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            backoff_multiplier: config.backoff_multiplier,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl RetryPolicy {
    /// `min(initial * multiplier^attempt, max)`, attempt counted from zero.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.powi(attempt.min(i32::MAX as u32) as i32);
        let millis = self.initial_delay.as_millis() as f64 * factor;
        let capped = millis.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped.max(0.0) as u64)
    }

    /// Run `operation` up to `max_retries + 1` times.
    ///
    /// Non-retryable errors propagate unchanged on first sight. When every
    /// attempt fails with a retryable error the result is
    /// [`AppError::ServiceUnavailable`].
    pub async fn retry_with_backoff<T, F, Fut>(&self, endpoint: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !err.is_retryable() {
                return Err(err);
            }
            if attempt >= self.max_retries {
                log::error!(
                    "{} failed after {} attempts: {}",
                    endpoint,
                    attempt + 1,
                    err
                );
                return Err(AppError::ServiceUnavailable {
                    endpoint: endpoint.to_string(),
                    attempts: attempt + 1,
                    last: err.to_string(),
                });
            }

            let delay = self.delay_for(attempt);
            log::warn!(
                "Attempt {} on {} failed, retrying in {:?}: {}",
                attempt + 1,
                endpoint,
                delay,
                err
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
