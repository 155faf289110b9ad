//! Retry orchestration with bounded, jittered exponential backoff.
//!
//! Wraps step invocations: retryable failures are repeated up to the attempt
//! cap with `base × 2^(attempt-1) + jitter` delays; non-retryable failures
//! and exhausted retries propagate the original error unchanged.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::error::{PipelineError, PipelineResult};

/// Backoff policy for retried steps.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Add up to half the computed delay as random jitter.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    #[must_use]
    pub fn no_retries() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Deterministic part of the delay after the given 1-based attempt.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let delay = self.base_delay.saturating_mul(1u32 << exp);
        delay.min(self.max_delay)
    }

    /// Delay with jitter applied, still capped at `max_delay`.
    #[must_use]
    pub fn jittered_delay_for(&self, attempt: u32) -> Duration {
        let base = self.delay_for(attempt);
        if !self.jitter || base.is_zero() {
            return base;
        }
        let jitter_ms = rand::thread_rng().gen_range(0..=base.as_millis() as u64 / 2);
        (base + Duration::from_millis(jitter_ms)).min(self.max_delay)
    }

    /// Run `op`, retrying retryable failures.
    ///
    /// `on_retry(attempt, max_attempts)` fires before each backoff sleep so a
    /// progress UI can render the retry counter. A rate-limited response
    /// waits at least its `Retry-After` hint.
    pub async fn run<T, F, Fut>(
        &self,
        mut op: F,
        mut on_retry: impl FnMut(u32, u32),
    ) -> PipelineResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = PipelineResult<T>>,
    {
        let mut attempt = 1u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.max_attempts => {
                    let mut delay = self.jittered_delay_for(attempt);
                    if let PipelineError::UpstreamRateLimited {
                        retry_after_secs: Some(secs),
                    } = &err
                    {
                        delay = delay.max(Duration::from_secs(*secs));
                    }
                    warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Step failed, retrying"
                    );
                    on_retry(attempt, self.max_attempts);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
            jitter: false,
        }
    }

    #[test]
    fn delay_doubles_per_attempt() {
        let p = policy();
        assert_eq!(p.delay_for(1), Duration::from_millis(100));
        assert_eq!(p.delay_for(2), Duration::from_millis(200));
        assert_eq!(p.delay_for(3), Duration::from_millis(400));
    }

    #[test]
    fn delay_is_capped() {
        let p = policy();
        assert_eq!(p.delay_for(10), Duration::from_secs(1));
        // Huge attempt numbers must not overflow.
        assert_eq!(p.delay_for(u32::MAX), Duration::from_secs(1));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let p = RetryPolicy {
            jitter: true,
            ..policy()
        };
        for _ in 0..100 {
            let d = p.jittered_delay_for(2);
            assert!(d >= Duration::from_millis(200));
            assert!(d <= Duration::from_millis(300));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_failures_then_succeeds() {
        let calls = AtomicU32::new(0);
        let mut retries = Vec::new();

        let result = policy()
            .run(
                || {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if n < 2 {
                            Err(PipelineError::NetworkTransient {
                                message: "timeout".into(),
                            })
                        } else {
                            Ok(42)
                        }
                    }
                },
                |attempt, max| retries.push((attempt, max)),
            )
            .await
            .unwrap();

        assert_eq!(result, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(retries, vec![(1, 3), (2, 3)]);
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_failures_propagate_immediately() {
        let calls = AtomicU32::new(0);

        let result: PipelineResult<()> = policy()
            .run(
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err(PipelineError::validation("bad input")) }
                },
                |_, _| {},
            )
            .await;

        assert!(matches!(result, Err(PipelineError::Validation { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_return_the_original_error() {
        let calls = AtomicU32::new(0);

        let result: PipelineResult<()> = policy()
            .run(
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async {
                        Err(PipelineError::NetworkTransient {
                            message: "still down".into(),
                        })
                    }
                },
                |_, _| {},
            )
            .await;

        match result {
            Err(PipelineError::NetworkTransient { message }) => {
                assert_eq!(message, "still down");
            }
            other => panic!("expected the original transient error, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
