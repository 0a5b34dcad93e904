//! Retry with exponential backoff and jitter for tool calls.
//!
//! Only errors for which [`AppError::is_retryable`] holds are retried;
//! validation failures and explicit rate limits surface immediately.

use crate::tools::registry::Tool;
use crate::types::{AppError, Result};
use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::time::Duration;

/// Backoff policy for transient tool failures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first one (default: 3)
    pub max_attempts: u32,
    /// Delay before the first retry (default: 500ms)
    pub base_delay: Duration,
    /// Upper bound for any single delay (default: 10s)
    pub max_delay: Duration,
    /// Relative jitter applied to each delay, clamped to `0.0..=1.0` (default: 0.2)
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            jitter: 0.2,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Jitter fraction, clamped to `0.0..=1.0`; NaN disables jitter
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = clamp_jitter(jitter);
        self
    }

    /// Delay before retry number `retry` (0-based), without jitter
    pub fn backoff(&self, retry: u32) -> Duration {
        let base_ms = self.base_delay.as_millis();
        let max_ms = self.max_delay.as_millis().max(base_ms);
        let multiplier = 1u128 << retry.min(20);
        let backoff_ms = base_ms.saturating_mul(multiplier).min(max_ms);
        Duration::from_millis(u64::try_from(backoff_ms).unwrap_or(u64::MAX))
    }

    /// Delay before retry number `retry` (0-based), with jitter applied
    pub fn delay_for(&self, retry: u32) -> Duration {
        let backoff = self.backoff(retry);
        let jitter = clamp_jitter(self.jitter);
        if jitter == 0.0 || backoff.is_zero() {
            return backoff;
        }
        let factor = rand::rng().random_range((1.0 - jitter)..=(1.0 + jitter));
        backoff.mul_f64(factor)
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or attempts run out
    pub async fn run<F, Fut, T>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    let delay = self.delay_for(attempt - 1);
                    tracing::warn!(
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Wraps a tool so every call goes through a [`RetryPolicy`]
pub struct RetryingTool<T> {
    inner: T,
    policy: RetryPolicy,
}

impl<T: Tool> RetryingTool<T> {
    pub fn new(inner: T, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl<T: Tool> Tool for RetryingTool<T> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn description(&self) -> &str {
        self.inner.description()
    }

    fn parameters_schema(&self) -> Value {
        self.inner.parameters_schema()
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        self.policy
            .run(|| self.inner.execute(input.clone()))
            .await
            .map_err(|err| match err {
                AppError::Timeout(msg) => AppError::Timeout(format!(
                    "{} (after {} attempts)",
                    msg, self.policy.max_attempts
                )),
                other => other,
            })
    }
}

fn clamp_jitter(jitter: f64) -> f64 {
    if jitter.is_nan() {
        0.0
    } else {
        jitter.clamp(0.0, 1.0)
    }
}
