//! Retry helper for transient failures in async operations
//!
//! Used when (re)opening a radio backend: a sniffer that exits early or a
//! radio that is momentarily busy is retried, a configuration problem is not.

use std::time::Duration;
use tokio::time::sleep;

/// Retry policy with exponential backoff
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub delay: Duration,
    pub backoff: u32,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(500),
            backoff: 2,
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after the given (zero-based) failed attempt
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let factor = self.backoff.max(1).saturating_pow(attempt as u32);
        self.delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Execute an async operation, retrying errors the predicate marks as transient
///
/// # Examples
/// ```rust
/// use bleradar::core::retry::{retry_async, RetryPolicy};
///
/// # async fn example() -> Result<u32, String> {
/// let value = retry_async(
///     "open backend",
///     RetryPolicy::default(),
///     |_err: &String| true,
///     || async { Ok::<u32, String>(7) },
/// )
/// .await?;
/// # Ok(value)
/// # }
/// ```
pub async fn retry_async<F, T, E, Fut, P>(
    operation_name: &str,
    policy: RetryPolicy,
    is_transient: P,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(error) => {
                attempt += 1;
                if attempt >= attempts || !is_transient(&error) {
                    return Err(error);
                }
                let delay = policy.delay_for(attempt - 1);
                log::debug!(
                    "Operation '{}' failed on attempt {}/{}, retrying in {:?}: {}",
                    operation_name,
                    attempt,
                    attempts,
                    delay,
                    error
                );
                sleep(delay).await;
            }
        }
    }
}
