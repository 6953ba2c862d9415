use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::time::{sleep_until, Instant};

/// Process-wide gate bounding the sustained request rate.
///
/// Admissions are handed out at strictly spaced instants, one `interval` apart,
/// without bursts. Callers are never rejected, only delayed, and every caller
/// gets a slot as soon as it asks, so nobody starves.
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn per_second(requests: u32) -> Self {
        Self::new(Duration::from_secs(1) / requests.max(1))
    }

    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_slot: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Waits until one more request may be issued.
    pub async fn acquire(&self) {
        let slot = self.reserve();
        sleep_until(slot).await;
    }

    fn reserve(&self) -> Instant {
        let now = Instant::now();
        let mut next = self
            .next_slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let slot = match *next {
            Some(reserved) if reserved > now => reserved,
            _ => now,
        };
        *next = Some(slot + self.interval);
        slot
    }
}
