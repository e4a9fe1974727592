use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use super::{RateLimitError, RateLimitStore, WindowHit};

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// In-process counters for a single server instance
#[derive(Debug, Default)]
pub struct MemoryRateLimitStore {
    windows: Mutex<HashMap<String, Window>>,
}

impl MemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a request as of `now`
    pub async fn hit_at(&self, key: &str, window: Duration, now: Instant) -> WindowHit {
        let mut windows = self.windows.lock().await;
        let entry = windows.entry(key.to_string()).or_insert(Window { started: now, count: 0 });

        if now.duration_since(entry.started) >= window {
            entry.started = now;
            entry.count = 0;
        }
        entry.count = entry.count.saturating_add(1);

        let elapsed = now.duration_since(entry.started);
        WindowHit {
            count: entry.count,
            resets_in: window.saturating_sub(elapsed),
        }
    }

    /// Remove windows that closed before `now`
    pub async fn purge_expired_at(&self, window: Duration, now: Instant) -> usize {
        let mut windows = self.windows.lock().await;
        let before = windows.len();
        windows.retain(|_, w| now.duration_since(w.started) < window);
        before - windows.len()
    }

    pub async fn tracked_keys(&self) -> usize {
        self.windows.lock().await.len()
    }

    /// Periodically drop expired windows so idle clients do not accumulate
    pub fn spawn_cleanup(self: Arc<Self>, window: Duration, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = self.purge_expired(window).await;
                if removed > 0 {
                    tracing::debug!("Rate limiter cleanup removed {} expired windows", removed);
                }
            }
        })
    }
}

#[async_trait]
impl RateLimitStore for MemoryRateLimitStore {
    async fn hit(&self, key: &str, window: Duration) -> Result<WindowHit, RateLimitError> {
        Ok(self.hit_at(key, window, Instant::now()).await)
    }

    async fn purge_expired(&self, window: Duration) -> usize {
        self.purge_expired_at(window, Instant::now()).await
    }
}
