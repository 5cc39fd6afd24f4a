//! Rate limiter
//!
//! Single-resource token bucket used to cap how often the journal issues a
//! physical durability sync. Unused capacity accumulates up to one second's
//! worth of permits, so a quiet period is followed by a burst before
//! throttling kicks in.

use std::time::{Duration, Instant};

/// Token-bucket rate limiter. Not thread-safe; owned by the journal thread.
pub struct RateLimiter {
    /// Time one fresh permit takes to accrue
    interval: Duration,

    /// Permits banked while calls arrived slower than the rate
    stored_permits: u64,

    /// Cap on banked permits (one second at the configured rate)
    max_permits: u64,

    /// Earliest instant the next fresh permit is free
    next_free: Instant,
}

impl RateLimiter {
    /// Create a limiter allowing `rate` permits per second.
    ///
    /// `rate` must be positive and below 1e6 (sub-microsecond intervals are
    /// not representable by the sleep granularity this relies on).
    pub fn new(rate: f64) -> Self {
        assert!(rate > 0.0 && rate < 1e6, "rate out of range: {}", rate);

        Self {
            interval: Duration::from_secs_f64(1.0 / rate),
            stored_permits: 0,
            max_permits: rate as u64,
            next_free: Instant::now(),
        }
    }

    /// Acquire one permit, sleeping as needed to respect the rate
    pub fn acquire(&mut self) {
        self.acquire_many(1);
    }

    /// Acquire `permits` permits, sleeping as needed to respect the rate
    pub fn acquire_many(&mut self, permits: u64) {
        let now = Instant::now();

        if now > self.next_free {
            // Bank permits for the idle time since the last acquisition
            let idle = now - self.next_free;
            let accrued = (idle.as_nanos() / self.interval.as_nanos().max(1)) as u64;
            self.stored_permits = (self.stored_permits + accrued).min(self.max_permits);
            self.next_free = now;
        }

        let wait = self.next_free.saturating_duration_since(now);

        // Stored permits are free; only fresh permits push next_free forward
        let stored = permits.min(self.stored_permits);
        let fresh = permits - stored;

        self.next_free += self.interval * fresh as u32;
        self.stored_permits -= stored;

        if !wait.is_zero() {
            std::thread::sleep(wait);
        }
    }
}
