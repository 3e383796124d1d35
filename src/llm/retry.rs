// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Backoff for transient model failures
//!
//! Rate limits, timeouts, 5xx answers and dropped connections are retried
//! with capped exponential delays. Anything that would fail the same way
//! again is returned at once.

use crate::config::ResilienceConfig;
use crate::error::{ApiError, QuillError, Result};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Runtime copy of [`ResilienceConfig`]
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry, doubled for each one after it
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Fraction of the delay added or removed at random
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::from(&ResilienceConfig::default())
    }
}

impl From<&ResilienceConfig> for RetryConfig {
    fn from(config: &ResilienceConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay_ms: config.base_delay_ms,
            max_delay_ms: config.max_delay_ms,
            jitter: config.jitter,
        }
    }
}

impl RetryConfig {
    /// A configuration that never retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt + 1`
    fn calculate_delay(&self, attempt: u32) -> Duration {
        let exponential_ms = self
            .base_delay_ms
            .saturating_mul(2u64.saturating_pow(attempt));
        let capped_ms = exponential_ms.min(self.max_delay_ms);

        let jitter_range = (capped_ms as f64 * self.jitter) as i64;
        let jitter_ms = if jitter_range > 0 {
            rand::rng().random_range(-jitter_range..=jitter_range)
        } else {
            0
        };

        let final_ms = (capped_ms as i64 + jitter_ms).max(0) as u64;
        Duration::from_millis(final_ms)
    }
}

/// Whether a failed model call is worth repeating
pub fn is_retryable(error: &QuillError) -> bool {
    let QuillError::Api(api_error) = error else {
        return false;
    };
    match api_error {
        ApiError::ServerError { status, .. } => *status >= 500,
        ApiError::Network(_)
        | ApiError::RateLimited(_)
        | ApiError::Timeout
        | ApiError::StreamError(_) => true,
        ApiError::AuthenticationFailed
        | ApiError::ModelNotFound(_)
        | ApiError::ContextTooLong { .. }
        | ApiError::InvalidResponse(_) => false,
    }
}

/// Run `operation` until it succeeds, fails for good, or runs out of
/// retries. `operation_name` only labels log lines.
pub async fn with_retry<F, Fut, T>(
    mut operation: F,
    config: Option<RetryConfig>,
    operation_name: &str,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let config = config.unwrap_or_default();

    let mut attempt: u32 = 0;
    loop {
        let error = match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    tracing::info!(target: "quill.llm", "{} recovered on attempt {}", operation_name, attempt + 1);
                }
                return Ok(value);
            }
            Err(error) => error,
        };

        if !is_retryable(&error) {
            tracing::debug!(target: "quill.llm", "{} failed permanently: {}", operation_name, error);
            return Err(error);
        }
        if attempt >= config.max_retries {
            tracing::warn!(
                target: "quill.llm",
                "{} still failing after {} retries: {}",
                operation_name,
                config.max_retries,
                error
            );
            return Err(error);
        }

        let delay = config.calculate_delay(attempt);
        tracing::warn!(
            target: "quill.llm",
            "{} attempt {} of {} failed ({}), next try in {}ms",
            operation_name,
            attempt + 1,
            config.max_retries + 1,
            error,
            delay.as_millis()
        );
        sleep(delay).await;
        attempt += 1;
    }
}
