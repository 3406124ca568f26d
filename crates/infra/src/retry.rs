//! Bounded retry with exponential backoff.
//!
//! A [`RetryPolicy`] is plain immutable configuration: build it once at
//! startup and hand it to whatever needs it. Delays are `tokio` timers, so a
//! retrying call suspends only its own task.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum InvalidRetryPolicy {
    #[error("attempts must be at least 1")]
    ZeroAttempts,

    #[error("backoff multiplier must be a finite number >= 1 (got {0})")]
    Backoff(f64),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    attempts: u32,
    base_delay: Duration,
    backoff: f64,
}

impl Default for RetryPolicy {
    /// 3 attempts, 300ms base delay, doubling.
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(300),
            backoff: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, base_delay: Duration, backoff: f64) -> Result<Self, InvalidRetryPolicy> {
        if attempts == 0 {
            return Err(InvalidRetryPolicy::ZeroAttempts);
        }
        if !backoff.is_finite() || backoff < 1.0 {
            return Err(InvalidRetryPolicy::Backoff(backoff));
        }
        Ok(Self {
            attempts,
            base_delay,
            backoff,
        })
    }

    /// A single attempt, no waiting.
    pub fn no_retry() -> Self {
        Self {
            attempts: 1,
            base_delay: Duration::ZERO,
            backoff: 1.0,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn backoff(&self) -> f64 {
        self.backoff
    }

    /// Wait after failed attempt `attempt` (1-based):
    /// `base_delay * backoff^(attempt - 1)`, saturating at `Duration::MAX`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        if exponent == 0 {
            return self.base_delay;
        }
        let nanos = (self.base_delay.as_nanos() as f64 * self.backoff.powi(exponent)).round();
        if nanos.is_finite() && nanos < u64::MAX as f64 {
            Duration::from_nanos(nanos as u64)
        } else {
            Duration::MAX
        }
    }

    /// Run `op` until it succeeds or the attempts are used up, retrying every
    /// error. The last error is returned on exhaustion.
    pub async fn run<T, E, F, Fut>(&self, label: &str, op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        self.run_if(label, op, |_| true).await
    }

    /// Like [`RetryPolicy::run`], but an error for which `retryable` returns
    /// `false` is surfaced immediately.
    pub async fn run_if<T, E, F, Fut, P>(&self, label: &str, mut op: F, retryable: P) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: std::fmt::Display,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < self.attempts && retryable(&err) => {
                    let delay = self.delay_after(attempt);
                    tracing::warn!(
                        operation = label,
                        attempt,
                        max_attempts = self.attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying after failure"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    if attempt > 1 {
                        tracing::error!(
                            operation = label,
                            attempts = attempt,
                            error = %err,
                            "giving up"
                        );
                    }
                    return Err(err);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use proptest::prelude::*;
    use tokio::time::Instant;

    fn policy(attempts: u32) -> RetryPolicy {
        RetryPolicy::new(attempts, Duration::from_millis(300), 2.0).unwrap()
    }

    /// Fails until call number `succeed_on` (1-based).
    async fn flaky(calls: &AtomicU32, succeed_on: u32) -> Result<u32, String> {
        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
        if n >= succeed_on {
            Ok(n)
        } else {
            Err(format!("transient failure #{n}"))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_exactly_k_calls() {
        for k in 1..=4 {
            let calls = AtomicU32::new(0);
            let out = policy(4).run("flaky", || flaky(&calls, k)).await;
            assert_eq!(out, Ok(k));
            assert_eq!(calls.load(Ordering::SeqCst), k);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn always_failing_runs_exactly_attempts_times() {
        let calls = AtomicU32::new(0);
        let out: Result<(), String> = policy(3)
            .run("doomed", || {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move { Err(format!("failure #{n}")) }
            })
            .await;

        assert_eq!(out, Err("failure #3".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_with_exponential_backoff() {
        let calls = AtomicU32::new(0);
        let started = Instant::now();
        let _ = policy(3).run("slow", || flaky(&calls, 3)).await;

        // 300ms after the first failure, 600ms after the second.
        let waited = started.elapsed();
        assert!(waited >= Duration::from_millis(900), "waited {waited:?}");
        assert!(waited < Duration::from_millis(1000), "waited {waited:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_error_short_circuits() {
        let calls = AtomicU32::new(0);
        let out: Result<(), String> = policy(5)
            .run_if(
                "permanent",
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err("constraint violated".to_string()) }
                },
                |e: &String| !e.contains("constraint"),
            )
            .await;

        assert!(out.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn rejects_invalid_configuration() {
        assert_eq!(
            RetryPolicy::new(0, Duration::ZERO, 2.0),
            Err(InvalidRetryPolicy::ZeroAttempts)
        );
        assert!(RetryPolicy::new(3, Duration::ZERO, 0.5).is_err());
        assert!(RetryPolicy::new(3, Duration::ZERO, f64::NAN).is_err());
    }

    #[test]
    fn delay_follows_base_times_backoff_power() {
        let p = policy(5);
        assert_eq!(p.delay_after(1), Duration::from_millis(300));
        assert_eq!(p.delay_after(2), Duration::from_millis(600));
        assert_eq!(p.delay_after(3), Duration::from_millis(1200));
    }

    #[test]
    fn delay_saturates_instead_of_overflowing() {
        let p = RetryPolicy::new(u32::MAX, Duration::from_secs(1), 10.0).unwrap();
        assert_eq!(p.delay_after(u32::MAX), Duration::MAX);
    }

    proptest! {
        #[test]
        fn delays_never_shrink(base_ms in 0u64..5_000, backoff in 1.0f64..4.0, attempt in 1u32..30) {
            let p = RetryPolicy::new(10, Duration::from_millis(base_ms), backoff).unwrap();
            prop_assert!(p.delay_after(attempt + 1) >= p.delay_after(attempt));
            prop_assert_eq!(p.delay_after(1), Duration::from_millis(base_ms));
        }
    }
}
