//! Bounded retry with optional exponential backoff.
//!
//! Not a circuit breaker: the caller decides which errors are worth another
//! attempt through the `should_retry` predicate.

use std::future::Future;
use std::time::Duration;

/// Retry behaviour for a single operation.
#[derive(Debug, Clone)]
pub struct RetryOptions {
    /// Retries after the first attempt (so `max_retries = 3` means up to 4 calls).
    pub max_retries: u32,
    /// Delay before the first retry.
    pub delay: Duration,
    /// Double the delay after every retry.
    pub exponential_backoff: bool,
    /// Upper bound for a single delay.
    pub max_delay: Duration,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay: Duration::from_millis(1000),
            exponential_backoff: true,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryOptions {
    pub fn new(max_retries: u32, delay: Duration, exponential_backoff: bool) -> Self {
        Self {
            max_retries,
            delay,
            exponential_backoff,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (1-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        let delay = if self.exponential_backoff {
            let factor = 2u32.saturating_pow(retry.saturating_sub(1));
            self.delay.saturating_mul(factor)
        } else {
            self.delay
        };
        delay.min(self.max_delay)
    }
}

/// Run `op` until it succeeds, `should_retry` rejects the error, or the
/// retry budget is spent. Returns the last error.
pub async fn retry_if<T, E, F, Fut, P>(
    options: &RetryOptions,
    mut should_retry: P,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: FnMut(&E) -> bool,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < options.max_retries && should_retry(&e) => {
                attempt += 1;
                let delay = options.delay_for(attempt);
                tracing::warn!(
                    attempt,
                    max_retries = options.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    "Operation failed, retrying: {}",
                    e
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Retry every error.
pub async fn retry<T, E, F, Fut>(options: &RetryOptions, op: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    retry_if(options, |_| true, op).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast(max_retries: u32) -> RetryOptions {
        RetryOptions::new(max_retries, Duration::from_millis(1), true)
    }

    #[test]
    fn test_delay_for_exponential() {
        let options = RetryOptions::new(5, Duration::from_millis(100), true);
        assert_eq!(options.delay_for(1), Duration::from_millis(100));
        assert_eq!(options.delay_for(2), Duration::from_millis(200));
        assert_eq!(options.delay_for(3), Duration::from_millis(400));
    }

    #[test]
    fn test_delay_for_constant_and_capped() {
        let constant = RetryOptions::new(5, Duration::from_millis(250), false);
        assert_eq!(constant.delay_for(4), Duration::from_millis(250));

        let capped = RetryOptions {
            max_delay: Duration::from_millis(300),
            ..RetryOptions::new(10, Duration::from_millis(100), true)
        };
        assert_eq!(capped.delay_for(8), Duration::from_millis(300));
    }

    #[tokio::test]
    async fn test_retry_succeeds_after_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: Result<&str, String> = retry(&fast(3), |_| {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err("transient".to_string())
                } else {
                    Ok("done")
                }
            }
        })
        .await;

        assert_eq!(result, Ok("done"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_budget() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: Result<(), String> = retry(&fast(2), |attempt| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(format!("failure {}", attempt))
            }
        })
        .await;

        assert_eq!(result, Err("failure 2".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_if_stops_on_permanent_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: Result<(), String> = retry_if(
            &fast(5),
            |e: &String| e != "permanent",
            |_| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err("permanent".to_string())
                }
            },
        )
        .await;

        tokio_test::assert_err!(result);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
