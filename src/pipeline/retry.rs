//! Retry with exponential backoff
//!
//! Only transient failures (timeout, rate limit, 5xx) are retried; permanent
//! failures return immediately so the caller can degrade through the
//! fallback policy without burning the backoff budget.

use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, warn};

use crate::types::ProviderResult;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Backoff before attempt `n + 1`: base * 2^n.
    fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt)
    }

    pub async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> ProviderResult<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = ProviderResult<T>>,
    {
        let mut attempt = 0u32;
        loop {
            let result = call().await;
            match &result.outcome {
                Ok(_) => {
                    if attempt > 0 {
                        info!(operation, attempts = attempt + 1, "Succeeded after retries");
                    }
                    return result;
                }
                Err(failure) if failure.kind.is_transient() && attempt + 1 < self.max_attempts => {
                    let delay = self.delay_after(attempt);
                    warn!(
                        operation,
                        attempt = attempt + 1,
                        max_attempts = self.max_attempts,
                        backoff_ms = delay.as_millis() as u64,
                        error = %failure,
                        "Transient failure, retrying"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(failure) => {
                    warn!(
                        operation,
                        attempts = attempt + 1,
                        error = %failure,
                        "Giving up"
                    );
                    return result;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ProviderErrorKind, ProviderFailure};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Instant;

    fn transient_failure() -> ProviderResult<()> {
        ProviderResult::failure(
            "stub",
            ProviderFailure::new("stub", ProviderErrorKind::Timeout, "slow"),
        )
    }

    fn permanent_failure() -> ProviderResult<()> {
        ProviderResult::failure(
            "stub",
            ProviderFailure::new("stub", ProviderErrorKind::NotFound, "missing"),
        )
    }

    #[tokio::test]
    async fn transient_failures_use_all_attempts_and_backoff() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::from_millis(20));

        let started = Instant::now();
        let result = policy
            .run("always-transient", || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { transient_failure() }
            })
            .await;
        let elapsed = started.elapsed();

        assert!(!result.succeeded());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        // Waits 20ms then 40ms between the three attempts.
        assert!(elapsed >= Duration::from_millis(60), "elapsed {:?}", elapsed);
        assert!(elapsed < Duration::from_millis(600), "elapsed {:?}", elapsed);
    }

    #[tokio::test]
    async fn permanent_failures_do_not_retry() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::from_millis(20));

        let result = policy
            .run("permanent", || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { permanent_failure() }
            })
            .await;

        assert!(!result.succeeded());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn success_returns_immediately() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::from_millis(20));

        let result = policy
            .run("ok", || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async {
                    ProviderResult {
                        provider: "stub".to_string(),
                        latency_ms: 1,
                        outcome: Ok(7u32),
                    }
                }
            })
            .await;

        assert_eq!(result.outcome.unwrap(), 7);
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn recovers_when_a_later_attempt_succeeds() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::from_millis(5));

        let result = policy
            .run("flaky", || {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 1 {
                        transient_failure()
                    } else {
                        ProviderResult {
                            provider: "stub".to_string(),
                            latency_ms: 1,
                            outcome: Ok(()),
                        }
                    }
                }
            })
            .await;

        assert!(result.succeeded());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }
}
