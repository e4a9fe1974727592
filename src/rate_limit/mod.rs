// rate_limit/mod.rs - Fixed-window request limiting per client IP
//
// Counters live behind `RateLimitStore` so a single instance can keep them in
// memory while a fleet shares them through Redis.

mod distributed;
mod memory;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::{AppConfig, RateLimitBackend};

pub use distributed::RedisRateLimitStore;
pub use memory::MemoryRateLimitStore;

#[derive(Debug, Error)]
pub enum RateLimitError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

/// Counter state after recording one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowHit {
    /// Requests seen in the current window, this one included
    pub count: u32,
    /// Time until the window closes and the counter starts over
    pub resets_in: Duration,
}

#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Record one request for `key` and report the window's state
    async fn hit(&self, key: &str, window: Duration) -> Result<WindowHit, RateLimitError>;

    /// Drop expired windows; returns how many were removed.
    /// Stores with native expiry have nothing to do.
    async fn purge_expired(&self, _window: Duration) -> usize {
        0
    }
}

/// Outcome of an allowed request, used for response headers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub limit: u32,
    pub remaining: u32,
    pub resets_in: Duration,
}

/// Rejection carrying the wait before the next window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Exceeded {
    pub limit: u32,
    pub retry_after: Duration,
}

impl Exceeded {
    /// Whole seconds for the Retry-After header, never zero
    pub fn retry_after_secs(&self) -> u64 {
        let secs = self.retry_after.as_secs();
        if self.retry_after.subsec_nanos() > 0 {
            secs + 1
        } else {
            secs.max(1)
        }
    }
}

#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    limit: u32,
    window: Duration,
    enabled: bool,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RateLimitStore>, limit: u32, window: Duration) -> Self {
        Self {
            store,
            limit,
            window,
            enabled: true,
        }
    }

    /// A limiter that lets everything through
    pub fn disabled() -> Self {
        Self {
            store: Arc::new(MemoryRateLimitStore::new()),
            limit: u32::MAX,
            window: Duration::from_secs(60),
            enabled: false,
        }
    }

    /// Build the limiter and its backing store from configuration
    pub async fn from_config(config: &AppConfig) -> Result<Self, RateLimitError> {
        if !config.api.enable_rate_limiting {
            return Ok(Self::disabled());
        }

        let store: Arc<dyn RateLimitStore> = match config.api.rate_limit_backend {
            RateLimitBackend::Memory => {
                let store = Arc::new(MemoryRateLimitStore::new());
                store.clone().spawn_cleanup(
                    config.rate_limit_window(),
                    Duration::from_secs(config.api.rate_limit_cleanup_secs.max(1)),
                );
                store
            }
            RateLimitBackend::Redis => Arc::new(RedisRateLimitStore::connect(&config.api.redis_url).await?),
        };

        Ok(Self::new(store, config.api.rate_limit_requests, config.rate_limit_window()))
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Count a request for `key`. `Ok(Err(_))` means the caller is over the limit.
    pub async fn check(&self, key: &str) -> Result<Result<RateLimitStatus, Exceeded>, RateLimitError> {
        let hit = self.store.hit(key, self.window).await?;

        if hit.count > self.limit {
            tracing::warn!("Rate limit exceeded for {}: {}/{}", key, hit.count, self.limit);
            return Ok(Err(Exceeded {
                limit: self.limit,
                retry_after: hit.resets_in,
            }));
        }

        Ok(Ok(RateLimitStatus {
            limit: self.limit,
            remaining: self.limit - hit.count,
            resets_in: hit.resets_in,
        }))
    }
}
