//! Rate-limit retry policy.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use storyreel_common::{GenerationConfig, StoryResult};

/// Reusable retry policy for rate-limited generative calls.
///
/// Only failures classified rate-limit by [`StoryError::is_rate_limited`]
/// are retried; any other failure is returned immediately. Waits grow
/// exponentially, with randomized jitter added to each wait. After the
/// attempt budget is exhausted the original failure is re-thrown.
///
/// [`StoryError::is_rate_limited`]: storyreel_common::StoryError::is_rate_limited
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, first try included.
    pub max_attempts: u32,

    /// Delay before the second attempt.
    pub initial_delay: Duration,

    /// Growth factor applied to the delay after each failed attempt.
    pub multiplier: f64,

    /// Fraction of the current delay added as random jitter.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(2000),
            multiplier: 2.0,
            jitter: 0.25,
        }
    }
}

impl RetryPolicy {
    /// Policy with the given budget and initial delay, default growth.
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
            ..Self::default()
        }
    }

    /// Policy from the application generation config.
    pub fn from_config(config: &GenerationConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            multiplier: config.backoff_multiplier,
            jitter: config.jitter,
        }
    }

    /// Run `operation` under this policy.
    pub async fn run<T, F, Fut>(&self, name: &str, operation: F) -> StoryResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = StoryResult<T>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut delay = self.initial_delay;

        for attempt in 1..=attempts {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(error) if error.is_rate_limited() && attempt < attempts => {
                    let wait = delay + delay.mul_f64(self.jitter * rand::thread_rng().gen::<f64>());
                    tracing::warn!(
                        operation = name,
                        attempt,
                        max_attempts = attempts,
                        wait_ms = wait.as_millis() as u64,
                        error = %error,
                        "Rate limited; backing off"
                    );
                    tokio::time::sleep(wait).await;
                    delay = delay.mul_f64(self.multiplier);
                }
                Err(error) => return Err(error),
            }
        }

        unreachable!("retry loop always returns on the final attempt")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use storyreel_common::StoryError;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_delay: Duration::from_millis(1),
            multiplier: 2.0,
            jitter: 0.0,
        }
    }

    /// Operation that fails rate-limited `failures` times, then succeeds.
    fn flaky_op(
        calls: Arc<AtomicU32>,
        failures: u32,
    ) -> impl Fn() -> std::pin::Pin<Box<dyn Future<Output = StoryResult<u32>> + Send>> {
        move || {
            let calls = calls.clone();
            Box::pin(async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n <= failures {
                    Err(StoryError::rate_limited(format!("throttled on call {n}")))
                } else {
                    Ok(n)
                }
            })
        }
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let result = fast_policy(5).run("op", flaky_op(calls.clone(), 3)).await;
        assert_eq!(result.unwrap(), 4);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_exhausts_budget_with_original_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let result = fast_policy(3).run("op", flaky_op(calls.clone(), 10)).await;

        let err = result.unwrap_err();
        assert!(err.is_rate_limited());
        assert!(err.to_string().contains("call 3"));
        // Exactly max_attempts attempts, no more.
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_rate_limit_error_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: StoryResult<()> = fast_policy(5)
            .run("op", move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(StoryError::generation("malformed prompt"))
                }
            })
            .await;

        assert!(!result.unwrap_err().is_rate_limited());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_zero_attempt_budget_still_tries_once() {
        let calls = Arc::new(AtomicU32::new(0));
        let result = fast_policy(0).run("op", flaky_op(calls.clone(), 0)).await;
        assert_eq!(result.unwrap(), 1);
    }
}
