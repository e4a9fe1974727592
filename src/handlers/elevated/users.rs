// handlers/elevated/users.rs - /api/admin/users

use axum::extract::{Extension, Path, State};
use serde_json::{json, Value};

use crate::access::require_master;
use crate::audit::{Committed, Origin};
use crate::database::models::{User, UserStatus};
use crate::error::ApiError;
use crate::handlers::path_id;
use crate::middleware::{ApiResponse, ApiResult, ClientInfo, Session};
use crate::state::AppState;

const USER_NOT_FOUND: &str = "User not found";

/// GET /api/admin/users - Every account, oldest first
pub async fn list(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<Vec<User>> {
    require_master(&session.actor)?;

    let users = state.store.list_users().await?;
    let total = users.len();
    Ok(ApiResponse::success(users).with_meta(json!({ "total": total })))
}

/// POST /api/admin/users/:id/approve
pub async fn approve(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    client: ClientInfo,
    Path(id): Path<String>,
) -> ApiResult<User> {
    change_status(state, session, client, id, UserStatus::Active, "APPROVE").await
}

/// POST /api/admin/users/:id/suspend
pub async fn suspend(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    client: ClientInfo,
    Path(id): Path<String>,
) -> ApiResult<User> {
    change_status(state, session, client, id, UserStatus::Suspended, "SUSPEND").await
}

async fn change_status(
    state: AppState,
    session: Session,
    client: ClientInfo,
    id: String,
    status: UserStatus,
    verb: &'static str,
) -> ApiResult<User> {
    require_master(&session.actor)?;
    let id = path_id(&id, USER_NOT_FOUND)?;

    if id == session.user_id() && status == UserStatus::Suspended {
        return Err(ApiError::validation("You cannot suspend your own account", None));
    }

    let origin = Origin::new(Some(session.user_id()), &client);
    let user = state
        .audit
        .guard(&origin, "USER", async {
            let previous = state
                .store
                .find_user(id)
                .await?
                .ok_or_else(|| ApiError::not_found(USER_NOT_FOUND))?;

            let user = state
                .store
                .set_user_status(id, status)
                .await?
                .ok_or_else(|| ApiError::not_found(USER_NOT_FOUND))?;

            let details = json!({
                "user_id": user.id,
                "email": user.email,
                "previous_status": previous.status,
                "status": user.status,
            });
            Ok(Committed::new(user, verb, details))
        })
        .await?;

    Ok(ApiResponse::success(user))
}

/// DELETE /api/admin/users/:id - Hard delete; activity rows keep the id
pub async fn delete(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    client: ClientInfo,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    require_master(&session.actor)?;
    let id = path_id(&id, USER_NOT_FOUND)?;

    if id == session.user_id() {
        return Err(ApiError::validation("You cannot delete your own account", None));
    }

    let origin = Origin::new(Some(session.user_id()), &client);
    let deleted = state
        .audit
        .guard(&origin, "USER", async {
            let user = state
                .store
                .find_user(id)
                .await?
                .ok_or_else(|| ApiError::not_found(USER_NOT_FOUND))?;

            if !state.store.delete_user(id).await? {
                return Err(ApiError::not_found(USER_NOT_FOUND));
            }

            Ok(Committed::new(
                json!({ "id": id, "deleted": true }),
                "DELETE",
                json!({ "user_id": id, "email": user.email }),
            ))
        })
        .await?;

    Ok(ApiResponse::success(deleted))
}
