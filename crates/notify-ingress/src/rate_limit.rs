//! Thin in-front rate limiter (§4.1), keyed by the authenticated
//! principal rather than the raw request. Fails open on KV errors —
//! `Store::check_rate_limit` already does this internally.

use notify_store::Store;

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub requests_per_minute: u32,
}

pub struct RateLimiter {
    store: Store,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(store: Store, config: RateLimitConfig) -> Self {
        Self { store, config }
    }

    /// Returns `Ok(())` if admitted, `Err(retry_after_secs)` if the
    /// quota for `identifier` is exhausted this window.
    pub async fn check(&self, identifier: &str) -> Result<(), u64> {
        if !self.config.enabled {
            return Ok(());
        }
        let (allowed, retry_after) = self
            .store
            .check_rate_limit(identifier, self.config.requests_per_minute)
            .await;
        if allowed {
            Ok(())
        } else {
            Err(retry_after)
        }
    }
}
