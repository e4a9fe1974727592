use std::sync::Arc;

use crate::audit::AuditLogger;
use crate::config::AppConfig;
use crate::database::Store;
use crate::rate_limit::RateLimiter;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn Store>,
    pub audit: AuditLogger,
    pub limiter: RateLimiter,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn Store>, limiter: RateLimiter) -> Self {
        Self {
            config: Arc::new(config),
            audit: AuditLogger::new(store.clone()),
            store,
            limiter,
        }
    }
}
