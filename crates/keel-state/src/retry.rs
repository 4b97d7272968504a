//! Bounded exponential backoff for transient store failures.

use std::thread;
use std::time::Duration;

use tracing::warn;

use crate::error::PersisterResult;

/// Exponential backoff configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Retries after the initial attempt.
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(30),
            max_retries: 3,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Run `op`, retrying while it fails with a transient error.
    pub fn run<T>(&self, what: &str, mut op: impl FnMut() -> PersisterResult<T>) -> PersisterResult<T> {
        let mut attempt = 0;
        loop {
            match op() {
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    let delay = self.delay(attempt);
                    warn!(op = what, attempt = attempt + 1, ?delay, error = %e, "retrying store operation");
                    thread::sleep(delay);
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}
