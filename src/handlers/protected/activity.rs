// handlers/protected/activity.rs - GET /api/activity

use axum::extract::{Extension, Query, State};
use serde::Deserialize;
use serde_json::json;

use crate::database::models::{ActivityFilter, ActivityLog};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, Session};
use crate::state::AppState;

pub const DEFAULT_LIMIT: i64 = 50;
pub const MAX_LIMIT: i64 = 200;

#[derive(Debug, Deserialize)]
pub struct ActivityQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    /// Case-insensitive substring of the action tag, e.g. `campaign` or `[USER]`
    pub action: Option<String>,
}

/// GET /api/activity - Masters see every row; other users see their own
pub async fn list(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Query(query): Query<ActivityQuery>,
) -> ApiResult<Vec<ActivityLog>> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
    if !(1..=MAX_LIMIT).contains(&limit) {
        return Err(ApiError::invalid_field("limit", format!("must be between 1 and {}", MAX_LIMIT)));
    }
    let offset = query.offset.unwrap_or(0);
    if offset < 0 {
        return Err(ApiError::invalid_field("offset", "must not be negative"));
    }

    let filter = ActivityFilter {
        user_id: if session.actor.is_master {
            None
        } else {
            Some(session.user_id())
        },
        action: query.action.map(|a| a.trim().to_string()).filter(|a| !a.is_empty()),
        limit,
        offset,
    };

    let (rows, total) = state.store.list_activity(&filter).await?;
    Ok(ApiResponse::success(rows).with_meta(json!({
        "total": total,
        "limit": limit,
        "offset": offset,
    })))
}
