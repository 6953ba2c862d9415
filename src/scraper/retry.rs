use crate::scraper::error::{RetryExhausted, TransportError};
use log::warn;
use std::future::Future;
use std::ops::RangeInclusive;
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// When and how often a failed request is attempted again.
///
/// Attempts stop at whichever comes first: `max_attempts` attempts made, or
/// `max_elapsed` passed since the first attempt. Between attempts the caller
/// sleeps for a random duration drawn from `backoff`, which spreads retries of
/// concurrent workers hitting the same endpoint.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub max_elapsed: Duration,
    pub backoff: RangeInclusive<Duration>,
    pub retryable: fn(&TransportError) -> bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            max_elapsed: Duration::from_secs(90),
            backoff: Duration::from_secs(2)..=Duration::from_secs(10),
            retryable: TransportError::is_transient,
        }
    }
}

impl RetryPolicy {
    /// A policy that makes a single attempt.
    pub fn never() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn backoff_delay(&self) -> Duration {
        let low = self.backoff.start().as_millis() as u64;
        let high = self.backoff.end().as_millis() as u64;
        if high <= low {
            return Duration::from_millis(low);
        }
        Duration::from_millis(fastrand::u64(low..=high))
    }

    /// Runs `op` until it succeeds or the policy gives up.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, RetryExhausted>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        let started = Instant::now();
        let mut attempts = 0;
        loop {
            attempts += 1;
            let error = match op().await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            let elapsed = started.elapsed();
            if !(self.retryable)(&error)
                || attempts >= self.max_attempts
                || elapsed >= self.max_elapsed
            {
                return Err(RetryExhausted {
                    attempts,
                    elapsed,
                    last_error: error,
                });
            }

            let delay = self.backoff_delay();
            warn!(
                "Retrying {} in {:?}: attempt {} ended with: {}",
                label, delay, attempts, error
            );
            sleep(delay).await;
        }
    }
}
