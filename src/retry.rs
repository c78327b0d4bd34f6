//! One retry combinator, parameterised by attempts/backoff/retryability,
//! reused by every worker loop instead of duplicating exponential backoff
//! logic in each one.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub backoff_factor: f64,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let scaled = self.base_delay.as_secs_f64() * self.backoff_factor.powi(attempt as i32 - 1);
        Duration::from_secs_f64(scaled.min(self.max_delay.as_secs_f64()))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(30),
        }
    }
}

/// Runs `op` up to `policy.max_attempts` times, sleeping with exponential
/// backoff between attempts. `is_retryable` decides whether a given error
/// is worth retrying at all; a non-retryable error returns immediately.
pub async fn retry_with_backoff<T, E, F, Fut>(
    policy: RetryPolicy,
    mut op: F,
    is_retryable: impl Fn(&E) -> bool,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= policy.max_attempts || !is_retryable(&err) {
                    return Err(err);
                }
                let delay = policy.delay_for_attempt(attempt);
                warn!(attempt, %err, delay_ms = delay.as_millis() as u64, "retrying after error");
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_until_success() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(1),
            backoff_factor: 1.0,
            max_delay: Duration::from_millis(5),
        };

        let result: Result<u32, &str> = retry_with_backoff(
            policy,
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err("transient")
                    } else {
                        Ok(n)
                    }
                }
            },
            |_| true,
        )
        .await;

        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn stops_on_non_retryable() {
        let policy = RetryPolicy::default();
        let result: Result<u32, &str> =
            retry_with_backoff(policy, || async { Err("fatal") }, |_| false).await;
        assert_eq!(result, Err("fatal"));
    }
}
