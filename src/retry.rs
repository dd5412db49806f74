//! Retry policy for source calls
//!
//! Exponential backoff with a cap and optional jitter, applied uniformly at the
//! market/universe call boundary. Errors the caller marks as permanent stop the
//! loop immediately.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Bounded exponential backoff policy
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first call
    pub max_attempts: u32,
    /// Delay after the first failure
    pub base_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Fraction of the delay used as +/- jitter (0.0 - 1.0)
    pub jitter_pct: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            jitter_pct: 0.2,
        }
    }
}

impl RetryPolicy {
    /// Create a policy, clamping nonsensical inputs
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        let base_delay = base_delay.max(Duration::from_millis(1));
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: max_delay.max(base_delay),
            jitter_pct: 0.0,
        }
    }

    /// A policy that calls exactly once
    pub fn no_retry() -> Self {
        Self::new(1, Duration::from_millis(1), Duration::from_millis(1))
    }

    /// Set jitter fraction
    pub fn jitter(mut self, pct: f64) -> Self {
        self.jitter_pct = pct.clamp(0.0, 1.0);
        self
    }

    /// Delay before retry number `retry` (0-based), before jitter
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.min(31));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    fn jittered(&self, delay: Duration) -> Duration {
        if self.jitter_pct <= 0.0 {
            return delay;
        }
        let spread = delay.as_millis() as f64 * self.jitter_pct;
        let delta = rand::thread_rng().gen_range(-spread..=spread);
        Duration::from_millis((delay.as_millis() as f64 + delta).max(0.0) as u64)
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out
    ///
    /// `op` receives the 0-based attempt number. The last error is returned
    /// unchanged when the policy gives up.
    pub async fn run<F, Fut, T, E, P>(&self, mut op: F, is_retryable: P) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
    {
        let mut attempt = 0;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    attempt += 1;
                    if attempt >= self.max_attempts || !is_retryable(&err) {
                        return Err(err);
                    }
                    let delay = self.jittered(self.backoff(attempt - 1));
                    tracing::trace!(attempt, delay_ms = delay.as_millis() as u64, "Retrying");
                    sleep(delay).await;
                }
            }
        }
    }
}
