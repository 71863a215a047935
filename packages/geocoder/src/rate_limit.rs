//! Request pacing for the geocoding provider.
//!
//! Two delays apply to every request:
//!
//! * a minimum interval between the *start* of consecutive requests, and
//! * a fixed pause after each request completes, whatever its outcome.

use std::time::Duration;

use tokio::time::Instant;

/// Serializes requests to an external service.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    post_delay: Duration,
    last_start: Option<Instant>,
}

impl RateLimiter {
    #[must_use]
    pub const fn new(min_interval: Duration, post_delay: Duration) -> Self {
        Self {
            min_interval,
            post_delay,
            last_start: None,
        }
    }

    /// Builds a limiter from millisecond settings.
    #[must_use]
    pub const fn from_millis(min_interval_ms: u64, post_delay_ms: u64) -> Self {
        Self::new(
            Duration::from_millis(min_interval_ms),
            Duration::from_millis(post_delay_ms),
        )
    }

    /// Waits until the next request may start, then records its start.
    pub async fn acquire(&mut self) {
        if let Some(last) = self.last_start {
            tokio::time::sleep_until(last + self.min_interval).await;
        }
        self.last_start = Some(Instant::now());
    }

    /// Applies the fixed post-request pause.
    pub async fn release(&self) {
        if !self.post_delay.is_zero() {
            tokio::time::sleep(self.post_delay).await;
        }
    }
}
