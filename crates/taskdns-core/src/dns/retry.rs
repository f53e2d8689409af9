// # Provider retry
//
// Every DNS provider call goes through `retry_with_backoff`. Only errors
// for which `Error::is_transient_dns()` holds are retried; the delay after
// the n-th failed call (0-based) is `base_delay * 2^n`. After the last
// attempt the underlying error is returned unchanged.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::Result;

/// Default number of provider calls before giving up
pub const DEFAULT_MAX_ATTEMPTS: usize = 5;

/// Default base delay
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

// 2^16 seconds is already far beyond any sensible wait
const MAX_BACKOFF_EXPONENT: u32 = 16;

/// Retry policy for provider calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of calls, including the first
    pub max_attempts: usize,
    /// Delay after the first failed call
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Create a policy
    pub fn new(max_attempts: usize, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// A policy that never sleeps, for tests
    pub fn immediate(max_attempts: usize) -> Self {
        Self::new(max_attempts, Duration::ZERO)
    }

    /// Delay after the `attempt`-th failed call (0-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.min(MAX_BACKOFF_EXPONENT);
        self.base_delay.saturating_mul(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_BASE_DELAY)
    }
}

/// Delay after the `attempt`-th failed call with the default one second base
pub fn exponential_backoff(attempt: u32) -> Duration {
    RetryPolicy::default().backoff(attempt)
}

/// Run `op` until it succeeds, fails permanently, or runs out of attempts
pub async fn retry_with_backoff<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt: u32 = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient_dns() && (attempt as usize) + 1 < policy.max_attempts => {
                let delay = policy.backoff(attempt);
                warn!(
                    attempt = attempt + 1,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Transient DNS provider error, backing off: {}",
                    e
                );
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
