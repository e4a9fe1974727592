use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::ApiError;
use crate::state::AppState;

use super::client::ClientInfo;

const LIMIT_HEADER: &str = "x-ratelimit-limit";
const REMAINING_HEADER: &str = "x-ratelimit-remaining";

fn set_headers(headers: &mut HeaderMap, limit: u32, remaining: u32) {
    headers.insert(LIMIT_HEADER, HeaderValue::from(limit));
    headers.insert(REMAINING_HEADER, HeaderValue::from(remaining));
}

/// Per-IP fixed-window limiting; over-limit requests get 429 with Retry-After
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let limiter = &state.limiter;
    if !limiter.is_enabled() {
        return next.run(request).await;
    }

    let client = ClientInfo::from_parts(
        request.headers(),
        request.extensions(),
        state.config.api.trust_proxy_headers,
    );
    let key = client.ip.unwrap_or_else(|| "unknown".to_string());

    match limiter.check(&key).await {
        Ok(Ok(status)) => {
            let mut response = next.run(request).await;
            set_headers(response.headers_mut(), status.limit, status.remaining);
            response
        }
        Ok(Err(exceeded)) => {
            let mut response = ApiError::RateLimited {
                retry_after_secs: exceeded.retry_after_secs(),
            }
            .into_response();
            set_headers(response.headers_mut(), exceeded.limit, 0);
            response
        }
        Err(e) => {
            // Counter store unreachable: serve the request rather than fail every client
            tracing::error!("Rate limit check failed for {}: {}", key, e);
            next.run(request).await
        }
    }
}
