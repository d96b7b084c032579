use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter as GovernorRateLimiter,
};
use std::num::NonZeroU32;

use super::client::RateLimitConfig;

/// Token bucket guarding calls to the artifact store
pub struct RateLimiter {
    limiter: GovernorRateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl RateLimiter {
    /// Create a new rate limiter from configuration. Zero values fall back to 1.
    pub fn new(config: RateLimitConfig) -> Self {
        let per_second = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(config.burst_size).unwrap_or(per_second);

        let quota = Quota::per_second(per_second).allow_burst(burst);
        let limiter = GovernorRateLimiter::direct(quota);

        Self { limiter }
    }

    /// Wait for a token
    pub async fn acquire(&self) {
        self.limiter.until_ready().await;
    }
}
