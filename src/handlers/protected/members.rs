// handlers/protected/members.rs - /api/properties/:id/members

use axum::extract::{Extension, Path, State};
use serde::Deserialize;
use serde_json::{json, Value};
use validator::Validate;

use crate::access::{self, PROPERTY_NOT_FOUND};
use crate::audit::{Committed, Origin};
use crate::database::models::Member;
use crate::error::ApiError;
use crate::handlers::path_id;
use crate::middleware::{ApiResponse, ApiResult, ClientInfo, Session, ValidatedJson};
use crate::state::AppState;

const MEMBER_NOT_FOUND: &str = "Member not found";

#[derive(Debug, Deserialize, Validate)]
pub struct AddMemberRequest {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
}

/// GET /api/properties/:id/members
pub async fn list(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> ApiResult<Vec<Member>> {
    let id = path_id(&id, PROPERTY_NOT_FOUND)?;
    access::authorize_property(state.store.as_ref(), &session.actor, id).await?;

    let members = state.store.list_members(id).await?;
    let total = members.len();
    Ok(ApiResponse::success(members).with_meta(json!({ "total": total })))
}

/// POST /api/properties/:id/members - Grant an existing user access by email
pub async fn add(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    client: ClientInfo,
    Path(id): Path<String>,
    ValidatedJson(req): ValidatedJson<AddMemberRequest>,
) -> ApiResult<Value> {
    let id = path_id(&id, PROPERTY_NOT_FOUND)?;
    let email = req.email.trim().to_lowercase();

    let origin = Origin::new(Some(session.user_id()), &client);
    let member = state
        .audit
        .guard(&origin, "PROPERTY", async {
            access::authorize_property(state.store.as_ref(), &session.actor, id).await?;

            let user = state
                .store
                .find_user_by_email(&email)
                .await?
                .ok_or_else(|| ApiError::not_found("User not found"))?;

            if !state.store.add_member(id, user.id).await? {
                return Err(ApiError::conflict("User is already a member of this property"));
            }

            Ok(Committed::new(
                json!({ "property_id": id, "user_id": user.id, "email": user.email, "name": user.name }),
                "ADD_MEMBER",
                json!({ "property_id": id, "user_id": user.id, "email": user.email }),
            ))
        })
        .await?;

    Ok(ApiResponse::created(member))
}

/// DELETE /api/properties/:id/members/:user_id
pub async fn remove(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    client: ClientInfo,
    Path((id, user_id)): Path<(String, String)>,
) -> ApiResult<Value> {
    let id = path_id(&id, PROPERTY_NOT_FOUND)?;
    let user_id = path_id(&user_id, MEMBER_NOT_FOUND)?;

    let origin = Origin::new(Some(session.user_id()), &client);
    let removed = state
        .audit
        .guard(&origin, "PROPERTY", async {
            access::authorize_property(state.store.as_ref(), &session.actor, id).await?;

            if !state.store.remove_member(id, user_id).await? {
                return Err(ApiError::not_found(MEMBER_NOT_FOUND));
            }

            Ok(Committed::new(
                json!({ "property_id": id, "user_id": user_id, "removed": true }),
                "REMOVE_MEMBER",
                json!({ "property_id": id, "user_id": user_id }),
            ))
        })
        .await?;

    Ok(ApiResponse::success(removed))
}
