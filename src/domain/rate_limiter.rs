//! Per-worker delivery throttle.

use governor::{DefaultDirectRateLimiter, Quota};
use std::num::NonZeroU32;
use std::time::Duration;

/// Paces a single worker to a fixed number of deliveries per minute.
///
/// Modelled as a pulse generator: slots are spaced `60s / rate` apart with a
/// burst of one, so [`wait`](Self::wait) never returns early and idle time is
/// not banked into a burst. The limiter starts drained, the first slot opens
/// one interval after construction.
///
/// Each worker owns its own limiter; the aggregate rate of a pool is roughly
/// `per-worker rate × worker count`.
pub struct RateLimiter {
    limiter: DefaultDirectRateLimiter,
    per_minute: u32,
    interval: Duration,
}

impl RateLimiter {
    /// Rate used when a non-positive rate is requested.
    pub const DEFAULT_PER_MINUTE: u32 = 60;

    /// Creates a limiter allowing `rate` deliveries per minute.
    ///
    /// A rate of zero falls back to [`Self::DEFAULT_PER_MINUTE`].
    pub fn per_minute(rate: u32) -> Self {
        let per_minute = if rate == 0 {
            Self::DEFAULT_PER_MINUTE
        } else {
            rate
        };
        let interval = Duration::from_secs(60) / per_minute;

        let quota = Quota::with_period(interval)
            .unwrap_or_else(|| Quota::per_second(NonZeroU32::MAX))
            .allow_burst(NonZeroU32::MIN);
        let limiter = DefaultDirectRateLimiter::direct(quota);

        // Drain the initial cell so the first pulse lands one interval out.
        let _ = limiter.check();

        Self {
            limiter,
            per_minute,
            interval,
        }
    }

    /// Blocks until the next delivery slot opens.
    pub async fn wait(&self) {
        self.limiter.until_ready().await;
    }

    pub fn rate_per_minute(&self) -> u32 {
        self.per_minute
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("per_minute", &self.per_minute)
            .field("interval", &self.interval)
            .finish()
    }
}
