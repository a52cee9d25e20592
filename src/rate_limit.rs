//! Rate limiting for external service calls
//!
//! Enforces a minimum interval between consecutive requests to the same
//! service. The pipeline processes candidates sequentially, so a plain
//! per-key timestamp map is sufficient - no cross-task coordination needed.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::config::RateLimitConfig;

/// Service keys the pipeline rate-limits.
pub mod service {
    /// The geographic discovery API.
    pub const DISCOVERY: &str = "discovery";
    /// Candidate website homepage fetches.
    pub const WEBSITE: &str = "website";
}

/// Minimum-interval limiter holding a last-call timestamp per service key.
///
/// An explicit instance injected into the clients that need it; there is no
/// module-level clock state. Keys without a configured interval pass through
/// without waiting.
#[derive(Debug)]
pub struct RateLimiter {
    intervals: HashMap<String, Duration>,
    last_call: HashMap<String, Instant>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            intervals: HashMap::new(),
            last_call: HashMap::new(),
        }
    }

    /// Build a limiter with the pipeline's two service intervals.
    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new()
            .with_interval(service::DISCOVERY, Duration::from_millis(config.discovery_interval_ms))
            .with_interval(service::WEBSITE, Duration::from_millis(config.website_interval_ms))
    }

    /// Register a minimum interval for a service key. An interval of zero
    /// disables limiting for that key.
    pub fn with_interval(mut self, key: &str, interval: Duration) -> Self {
        self.intervals.insert(key.to_string(), interval);
        self
    }

    /// Wait until at least the configured interval has elapsed since the last
    /// `acquire` for `key`, then stamp the key and return.
    pub async fn acquire(&mut self, key: &str) {
        if let (Some(interval), Some(last)) = (self.intervals.get(key), self.last_call.get(key)) {
            let elapsed = last.elapsed();
            if elapsed < *interval {
                let wait = *interval - elapsed;
                debug!("Rate limiter waiting {:?} before next '{}' request", wait, key);
                sleep(wait).await;
            }
        }
        self.last_call.insert(key.to_string(), Instant::now());
    }

    /// The interval configured for a key, if any.
    pub fn interval_for(&self, key: &str) -> Option<Duration> {
        self.intervals.get(key).copied()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
