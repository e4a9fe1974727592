// handlers/public/health.rs - GET / and GET /health

use axum::extract::State;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

/// GET / - Service descriptor
pub async fn root() -> ApiResponse<Value> {
    ApiResponse::success(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "public": ["/health", "/api/auth/register", "/api/auth/login"],
            "protected": [
                "/api/auth/session",
                "/api/profile",
                "/api/properties",
                "/api/campaigns",
                "/api/affiliates",
                "/api/ad-networks",
                "/api/advertisers",
                "/api/activity"
            ],
            "elevated": ["/api/admin/users"]
        }
    }))
}

/// GET /health - 200 when the database answers, 503 otherwise
pub async fn health(State(state): State<AppState>) -> ApiResult<Value> {
    match state.store.health_check().await {
        Ok(()) => Ok(ApiResponse::success(json!({
            "status": "ok",
            "database": "connected",
            "version": env!("CARGO_PKG_VERSION"),
        }))),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            Err(ApiError::ServiceUnavailable("Database unavailable".to_string()))
        }
    }
}
