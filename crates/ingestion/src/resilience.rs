//! Rate limiting and retry for source requests
//!
//! Every request to a bibliographic API waits on a token bucket first, and
//! transient failures are retried with exponential backoff until the retry
//! budget is spent.

use backoff::{future::retry_notify, ExponentialBackoff};
use citeset_common::errors::{AppError, Result};
use citeset_common::metrics::record_retry;
use governor::{
    clock::QuantaClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::future::Future;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Rate limiter using governor crate
pub type SourceRateLimiter = RateLimiter<NotKeyed, InMemoryState, QuantaClock>;

/// Create a new rate limiter allowing `requests_per_minute`, without bursts
pub fn create_rate_limiter(requests_per_minute: u32) -> Arc<SourceRateLimiter> {
    let per_minute = NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN);
    let quota = Quota::per_minute(per_minute).allow_burst(NonZeroU32::MIN);

    Arc::new(RateLimiter::direct(quota))
}

/// Retry policy for transient failures
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// First delay between attempts
    pub initial_interval: Duration,
    /// Stop retrying once this much time has passed
    pub max_elapsed: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(500),
            max_elapsed: Duration::from_secs(120),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_elapsed: Duration) -> Self {
        Self {
            max_elapsed,
            ..Self::default()
        }
    }

    /// Policy that never retries
    pub fn none() -> Self {
        Self {
            initial_interval: Duration::ZERO,
            max_elapsed: Duration::ZERO,
        }
    }

    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.initial_interval,
            current_interval: self.initial_interval,
            max_elapsed_time: Some(self.max_elapsed),
            ..ExponentialBackoff::default()
        }
    }

    /// Run `op`, retrying while it fails with a transient error
    ///
    /// Permanent errors are returned immediately; once the budget is spent
    /// the last transient error is returned.
    pub async fn run<T, F, Fut>(&self, source: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        retry_notify(
            self.backoff(),
            || {
                let attempt = op();
                async move {
                    attempt.await.map_err(|e| {
                        if e.is_transient() {
                            backoff::Error::transient(e)
                        } else {
                            backoff::Error::permanent(e)
                        }
                    })
                }
            },
            |err: AppError, delay: Duration| {
                warn!(
                    source = source,
                    error = %err,
                    retry_in_ms = delay.as_millis() as u64,
                    "Transient fetch failure, retrying"
                );
                record_retry(source);
            },
        )
        .await
    }
}
