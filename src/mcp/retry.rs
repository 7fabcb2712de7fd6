//! Retry Logic and Error Resilience
//!
//! Exponential backoff for flaky single operations: listing pages against a
//! slow server, and judge completions hitting rate limits. Tool calls are
//! never retried because they may have side effects.
//!
//! # Example
//!
//! ```ignore
//! use mcp_interviewer::mcp::retry::{RetryConfig, retry_with_backoff};
//!
//! let config = RetryConfig::default();
//! let page = retry_with_backoff(&config, SessionError::is_transport, || async {
//!     client.list(ListKind::Tools, None).await
//! }).await?;
//! ```

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Retry configuration
///
/// # Fields
///
/// * `max_attempts` - Total attempts including the first one (default: 3)
/// * `base_delay` - Delay before the first retry, doubled for each further retry (default: 1s)
/// * `max_delay` - Cap on any single delay (default: 30s)
/// * `jitter` - Random delay variation factor (default: 0.0)
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including initial attempt)
    pub max_attempts: usize,

    /// Base delay before first retry
    pub base_delay: Duration,

    /// Maximum delay between retries
    pub max_delay: Duration,

    /// Jitter factor (0.0 to 1.0)
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            jitter: 0.0,
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// A config that makes exactly one attempt
    pub fn none() -> Self {
        Self::default().max_attempts(1)
    }

    pub fn max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the jitter factor, clamped to `0.0..=1.0`
    pub fn jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// Calculate the delay after a failed attempt (0-based)
    ///
    /// Uses exponential backoff: `base_delay * 2^attempt`, plus up to
    /// `jitter` of that value at random, capped at `max_delay`.
    pub fn calculate_delay(&self, attempt: usize) -> Duration {
        let factor = 2_u32.saturating_pow(attempt.min(31) as u32);
        let exponential_delay = self.base_delay.saturating_mul(factor);

        let jitter_offset = if self.jitter > 0.0 {
            exponential_delay.mul_f64(self.jitter * rand::random::<f64>())
        } else {
            Duration::ZERO
        };

        exponential_delay
            .saturating_add(jitter_offset)
            .min(self.max_delay)
    }
}

/// Retry an operation with exponential backoff
///
/// The operation runs up to `config.max_attempts` times. Errors for which
/// `is_retryable` returns false are returned immediately; otherwise the last
/// error is returned once attempts run out.
pub async fn retry_with_backoff<F, Fut, T, E, R>(
    config: &RetryConfig,
    is_retryable: R,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
    E: Display,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    tracing::info!(
                        "Operation succeeded on attempt {} after {} retries",
                        attempt + 1,
                        attempt
                    );
                }
                return Ok(result);
            }
            Err(e) if attempt + 1 < max_attempts && is_retryable(&e) => {
                let delay = config.calculate_delay(attempt);
                tracing::warn!(
                    "Attempt {} failed: {}, retrying after {:?}",
                    attempt + 1,
                    e,
                    delay
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                if attempt > 0 {
                    tracing::error!("Operation failed after {} attempts: {}", attempt + 1, e);
                }
                return Err(e);
            }
        }
    }
}

/// Check if an HTTP status code should be retried
///
/// Retryable: 408 Request Timeout, 429 Too Many Requests, and 5xx except
/// 501 Not Implemented and 505 HTTP Version Not Supported.
pub fn should_retry_status(status: u16) -> bool {
    match status {
        408 | 429 => true,
        500..=599 => status != 501 && status != 505,
        _ => false,
    }
}
