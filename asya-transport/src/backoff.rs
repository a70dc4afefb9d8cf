//! A single exponential-backoff policy shared by every retrying caller in
//! the workspace: transport publish retries, the sidecar's progress/final
//! POST retries, and the operator's status-update conflict retries.
//!
//! Grounded on the teacher's `airssys_rt::supervisor::RestartBackoff`
//! (base delay, 2x-per-attempt growth, capped max delay), reshaped from a
//! stateful restart tracker into a stateless policy plus a retry-loop
//! helper, since none of this workspace's callers need a sliding window.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

/// Exponential-backoff policy: `delay = base * 2^min(attempt, cap)`,
/// capped at `max_delay`, with up to `jitter_fraction` of the delay added
/// or subtracted at random to avoid thundering-herd retries.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    /// Delay before the first retry (attempt 0).
    pub base_delay: Duration,
    /// Maximum number of attempts, including the first (non-retry) one.
    pub max_attempts: u32,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Fraction of the computed delay to randomize, in `[0.0, 1.0]`.
    pub jitter_fraction: f64,
}

impl BackoffPolicy {
    /// Creates a policy with no jitter.
    pub fn new(base_delay: Duration, max_attempts: u32, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_attempts,
            max_delay,
            jitter_fraction: 0.0,
        }
    }

    /// Returns a copy of this policy with jitter enabled.
    pub fn with_jitter(mut self, jitter_fraction: f64) -> Self {
        self.jitter_fraction = jitter_fraction.clamp(0.0, 1.0);
        self
    }

    /// Computes the delay before retry number `attempt` (0-indexed,
    /// counting the first retry after the initial attempt as 0).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let capped_attempt = attempt.min(10);
        let multiplier = 2u64.saturating_pow(capped_attempt);
        let delay_ms = self.base_delay.as_millis().saturating_mul(multiplier as u128);
        let delay = Duration::from_millis(delay_ms.min(u64::MAX as u128) as u64);
        let delay = delay.min(self.max_delay);

        if self.jitter_fraction <= 0.0 {
            return delay;
        }
        let jitter_ms = (delay.as_millis() as f64 * self.jitter_fraction) as i64;
        if jitter_ms <= 0 {
            return delay;
        }
        let offset = rand::thread_rng().gen_range(-jitter_ms..=jitter_ms);
        let jittered_ms = (delay.as_millis() as i64 + offset).max(0) as u64;
        Duration::from_millis(jittered_ms)
    }
}

impl Default for BackoffPolicy {
    /// 100ms base, 5 attempts, 30s cap, no jitter — a reasonable default
    /// for transport publish retries.
    fn default() -> Self {
        Self::new(Duration::from_millis(100), 5, Duration::from_secs(30))
    }
}

/// Retries `operation` according to `policy` until it returns `Ok`, the
/// attempt budget is exhausted, or `should_retry` says the error is not
/// worth retrying. Returns the last error on exhaustion.
pub async fn retry<F, Fut, T, E>(
    policy: &BackoffPolicy,
    should_retry: impl Fn(&E) -> bool,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt + 1 >= policy.max_attempts || !should_retry(&err) => {
                return Err(err)
            }
            Err(_) => {
                tokio::time::sleep(policy.delay_for(attempt)).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn delay_doubles_per_attempt_until_capped() {
        let policy = BackoffPolicy::new(Duration::from_millis(100), 10, Duration::from_secs(60));
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(400));
    }

    #[test]
    fn delay_is_capped_at_max_delay() {
        let policy = BackoffPolicy::new(Duration::from_millis(100), 20, Duration::from_secs(1));
        assert_eq!(policy.delay_for(10), Duration::from_secs(1));
    }

    #[test]
    fn jitter_stays_non_negative_and_bounded() {
        let policy =
            BackoffPolicy::new(Duration::from_millis(1000), 5, Duration::from_secs(10))
                .with_jitter(0.5);
        for attempt in 0..5 {
            let delay = policy.delay_for(attempt);
            assert!(delay <= Duration::from_millis(1500 * 2u64.pow(attempt.min(3))));
        }
    }

    #[tokio::test]
    async fn retry_succeeds_after_transient_failures() {
        let attempts = AtomicU32::new(0);
        let policy = BackoffPolicy::new(Duration::from_millis(1), 5, Duration::from_millis(10));

        let result: Result<&str, &str> = retry(&policy, |_| true, || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err("transient")
                } else {
                    Ok("ok")
                }
            }
        })
        .await;

        assert_eq!(result, Ok("ok"));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retry_stops_on_non_retryable_error() {
        let attempts = AtomicU32::new(0);
        let policy = BackoffPolicy::new(Duration::from_millis(1), 5, Duration::from_millis(10));

        let result: Result<&str, &str> = retry(&policy, |_| false, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err("structural") }
        })
        .await;

        assert_eq!(result, Err("structural"));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retry_gives_up_after_max_attempts() {
        let attempts = AtomicU32::new(0);
        let policy = BackoffPolicy::new(Duration::from_millis(1), 3, Duration::from_millis(10));

        let result: Result<&str, &str> = retry(&policy, |_| true, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err("always fails") }
        })
        .await;

        assert_eq!(result, Err("always fails"));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
