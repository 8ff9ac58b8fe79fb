//! Fixed-window rate limiting for publish endpoints
//!
//! Each `(endpoint, client fingerprint, window index)` gets a counter in the
//! key-value store that expires with its window. The read-then-increment is
//! not atomic, so concurrent bursts can undercount slightly.
//!
//! Counter storage failures never block a publish: the limiter logs the error
//! and lets the request through.

use pageshelf::clock::SharedClock;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::address::KeyLayout;
use crate::storage::KvStorage;

/// Fingerprint used when a request carries no client address
pub const ANONYMOUS_FINGERPRINT: &str = "anonymous";

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub window_seconds: u64,
    pub limit: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_seconds: 60,
            limit: 60,
        }
    }
}

/// Counter state after an admitted request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub limit: u64,
    pub remaining: u64,
    /// Seconds until the current window ends
    pub reset_after: u64,
}

/// Returned when a caller has used up its window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitExceeded {
    /// Seconds the caller should wait; always the window size
    pub retry_after: u64,
    pub limit: u64,
}

pub struct RateLimiter {
    kv: Arc<dyn KvStorage>,
    config: RateLimitConfig,
    clock: SharedClock,
}

impl RateLimiter {
    pub fn new(kv: Arc<dyn KvStorage>, config: RateLimitConfig, clock: SharedClock) -> Self {
        let config = RateLimitConfig {
            window_seconds: config.window_seconds.max(1),
            limit: config.limit,
        };
        Self { kv, config, clock }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Count a request against the caller's current window
    pub async fn check(
        &self,
        endpoint: &str,
        fingerprint: &str,
    ) -> Result<RateLimitStatus, RateLimitExceeded> {
        let window = self.config.window_seconds;
        let limit = self.config.limit;
        let now_secs = self.clock.now_millis() / 1000;
        let window_index = now_secs / window;
        let reset_after = window - (now_secs % window);

        let fingerprint = if fingerprint.is_empty() {
            ANONYMOUS_FINGERPRINT
        } else {
            fingerprint
        };
        let key = KeyLayout::rate_limit_key(endpoint, fingerprint, window_index);

        let count = match self.kv.get(&key).await {
            Ok(value) => value.and_then(|v| v.parse::<u64>().ok()).unwrap_or(0),
            Err(e) => {
                warn!(error = %e, %key, "rate limiter: failed to read counter, allowing request");
                return Ok(self.unlimited(reset_after));
            }
        };

        if count >= limit {
            return Err(RateLimitExceeded {
                retry_after: window,
                limit,
            });
        }

        let ttl = Duration::from_secs(window);
        if let Err(e) = self.kv.put(&key, (count + 1).to_string(), Some(ttl)).await {
            warn!(error = %e, %key, "rate limiter: failed to increment counter, allowing request");
            return Ok(self.unlimited(reset_after));
        }

        Ok(RateLimitStatus {
            limit,
            remaining: limit - (count + 1),
            reset_after,
        })
    }

    fn unlimited(&self, reset_after: u64) -> RateLimitStatus {
        RateLimitStatus {
            limit: self.config.limit,
            remaining: self.config.limit,
            reset_after,
        }
    }
}
