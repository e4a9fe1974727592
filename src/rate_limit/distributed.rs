use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::time::Duration;
use tracing::{debug, info};

use super::{RateLimitError, RateLimitStore, WindowHit};

const KEY_PREFIX: &str = "affiliate-hub:ratelimit:";

/// Counters shared by every instance pointing at the same Redis
#[derive(Clone)]
pub struct RedisRateLimitStore {
    connection: ConnectionManager,
}

impl RedisRateLimitStore {
    pub async fn connect(redis_url: &str) -> Result<Self, RateLimitError> {
        info!("Connecting rate limiter to Redis");
        let client = Client::open(redis_url)?;
        let connection = ConnectionManager::new(client).await?;
        Ok(Self { connection })
    }
}

#[async_trait]
impl RateLimitStore for RedisRateLimitStore {
    async fn hit(&self, key: &str, window: Duration) -> Result<WindowHit, RateLimitError> {
        let redis_key = format!("{}{}", KEY_PREFIX, key);
        let window_ms = window.as_millis() as i64;
        let mut conn = self.connection.clone();

        let count: i64 = conn.incr(&redis_key, 1).await?;

        // First hit opens the window
        if count == 1 {
            let _: () = conn.pexpire(&redis_key, window_ms).await?;
        }

        let mut ttl_ms: i64 = conn.pttl(&redis_key).await?;
        if ttl_ms < 0 {
            // Key lost its expiry (e.g. a crash between INCR and PEXPIRE)
            let _: () = conn.pexpire(&redis_key, window_ms).await?;
            ttl_ms = window_ms;
        }

        debug!("Rate limit hit {} => {} ({}ms left)", redis_key, count, ttl_ms);

        Ok(WindowHit {
            count: u32::try_from(count).unwrap_or(u32::MAX),
            resets_in: Duration::from_millis(ttl_ms as u64),
        })
    }
}
