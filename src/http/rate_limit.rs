//! Attempt throttling
//!
//! A client configured with a [`RateLimiterConfig`] takes one permit from a
//! shared governor bucket before each attempt. Retries and re-sends after a
//! token refresh pay for their own permit.

use governor::clock::DefaultClock;
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as Governor};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::debug;

type DirectBucket = Governor<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>;

/// Attempt rate for one client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimiterConfig {
    /// Sustained attempts per second
    pub requests_per_second: u32,
    /// Attempts allowed back to back before throttling starts
    pub burst_size: u32,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self::new(10, 10)
    }
}

impl RateLimiterConfig {
    pub fn new(requests_per_second: u32, burst_size: u32) -> Self {
        Self {
            requests_per_second,
            burst_size,
        }
    }

    /// Governor quota, with zero rates raised to one
    fn quota(&self) -> Quota {
        let per_second = NonZeroU32::new(self.requests_per_second).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(self.burst_size).unwrap_or(NonZeroU32::MIN);
        Quota::per_second(per_second).allow_burst(burst)
    }
}

/// Permit bucket shared by clones of a client
#[derive(Clone)]
pub struct RateLimiter {
    config: RateLimiterConfig,
    bucket: Arc<DirectBucket>,
}

impl RateLimiter {
    pub fn new(config: &RateLimiterConfig) -> Self {
        Self {
            config: *config,
            bucket: Arc::new(Governor::direct(config.quota())),
        }
    }

    /// Configuration this limiter was built from
    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }

    /// Take a permit, waiting for the bucket to refill when it is empty
    pub async fn acquire(&self) {
        if self.try_acquire() {
            return;
        }
        debug!(
            "Attempt throttled at {} requests/s, waiting for a permit",
            self.config.requests_per_second
        );
        self.bucket.until_ready().await;
    }

    /// Take a permit only if one is available right now
    pub fn try_acquire(&self) -> bool {
        self.bucket.check().is_ok()
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("config", &self.config)
            .finish()
    }
}
