//! Retry of transient storage failures
//!
//! Every attempt runs under a deadline; a deadline miss counts as a
//! transient [`StorageError::Timeout`]. Only transient errors are retried,
//! logical failures such as `NotFound` return immediately.
//!
//! Backoff schedule for a base delay `d`: d, 2d, 4d, ...

use std::future::Future;
use std::time::Duration;

use remsync_core::domain::SessionConfig;
use remsync_core::ports::StorageError;
use tracing::{info, warn};

/// Retry budget for a single operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Deadline for each individual attempt
    pub attempt_timeout: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            max_attempts: config.max_retries.max(1),
            base_delay: config.retry_delay,
            attempt_timeout: config.operation_timeout,
        }
    }

    /// Delay slept after the failed attempt number `attempt` (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            attempt_timeout: Duration::from_secs(300),
        }
    }
}

/// Executes an async operation, retrying transient failures
///
/// The operation is attempted at most `policy.max_attempts` times. The last
/// error is returned once the budget is exhausted.
pub async fn with_retry<F, Fut, T>(
    policy: &RetryPolicy,
    operation_name: &str,
    mut f: F,
) -> Result<T, StorageError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StorageError>>,
{
    let mut attempt = 1;
    loop {
        let result = match tokio::time::timeout(policy.attempt_timeout, f()).await {
            Ok(result) => result,
            Err(_) => Err(StorageError::Timeout(format!(
                "{operation_name} exceeded {:?}",
                policy.attempt_timeout
            ))),
        };

        match result {
            Ok(value) => {
                if attempt > 1 {
                    info!(
                        operation = operation_name,
                        attempt, "Operation succeeded after retry"
                    );
                }
                return Ok(value);
            }
            Err(err) if err.is_transient() && attempt < policy.max_attempts => {
                let delay = policy.delay_after(attempt);
                warn!(
                    operation = operation_name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Transient error, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
