//! Timeout and retry around a single provider call.

use std::time::Duration;

use tracing::{debug, warn};

use super::{OcrProvider, ProviderError, Recognition};
use crate::config::RetryConfig;

/// How often a failed provider call is re-attempted.
///
/// The default makes exactly one attempt: provider quota is spent only when
/// an operator opts in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }

    /// Exponential delay before retry number `attempt + 1`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// Runs `provider.recognize` under `timeout`, retrying UNKNOWN-class
/// failures as allowed by `retry`. A timeout is an UNKNOWN failure.
pub async fn call_with_policy(
    provider: &dyn OcrProvider,
    bytes: &[u8],
    mime: &str,
    timeout: Duration,
    retry: &RetryPolicy,
) -> Result<Recognition, ProviderError> {
    let max_attempts = retry.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        let result = match tokio::time::timeout(timeout, provider.recognize(bytes, mime)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::timeout(provider.name(), timeout)),
        };

        match result {
            Ok(recognition) => {
                debug!(
                    provider = provider.name(),
                    attempt = attempt + 1,
                    chars = recognition.text.len(),
                    "provider call succeeded"
                );
                return Ok(recognition);
            }
            Err(e) if e.code.is_retryable() && attempt + 1 < max_attempts => {
                let wait = retry.backoff(attempt);
                warn!(
                    provider = provider.name(),
                    attempt = attempt + 1,
                    ?wait,
                    error = %e,
                    "provider call failed, retrying"
                );
                tokio::time::sleep(wait).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Health check bounded by `timeout`.
pub async fn check_with_timeout(
    provider: &dyn OcrProvider,
    timeout: Duration,
) -> Result<(), ProviderError> {
    match tokio::time::timeout(timeout, provider.health_check()).await {
        Ok(result) => result,
        Err(_) => Err(ProviderError::timeout(provider.name(), timeout)),
    }
}
