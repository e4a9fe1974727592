// handlers/protected/session.rs - GET /api/auth/session and PUT /api/profile

use axum::extract::{Extension, State};
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use crate::audit::{Committed, Origin};
use crate::database::models::ProfileChanges;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, ClientInfo, Session, SessionView, ValidatedJson};
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ProfileRequest {
    #[validate(custom(function = "crate::validation::validate_name"))]
    pub name: Option<String>,
    #[validate(custom(function = "crate::validation::validate_timezone"))]
    pub timezone: Option<String>,
}

/// GET /api/auth/session - The caller's identity as of this request
pub async fn session(Extension(session): Extension<Session>) -> ApiResult<SessionView> {
    Ok(ApiResponse::success(session.view()))
}

/// PUT /api/profile - Change display name and/or timezone
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    client: ClientInfo,
    ValidatedJson(req): ValidatedJson<ProfileRequest>,
) -> ApiResult<SessionView> {
    let changes = ProfileChanges {
        name: req.name.map(|n| n.trim().to_string()),
        timezone: req.timezone,
    };
    if changes.name.is_none() && changes.timezone.is_none() {
        return Err(ApiError::validation("No changes supplied", None));
    }

    let origin = Origin::new(Some(session.user_id()), &client);
    let view = state
        .audit
        .guard(&origin, "USER", async {
            let mut fields = Vec::new();
            if changes.name.is_some() {
                fields.push("name");
            }
            if changes.timezone.is_some() {
                fields.push("timezone");
            }

            let user = state
                .store
                .update_profile(session.user_id(), changes)
                .await?
                .ok_or_else(|| ApiError::not_found("User not found"))?;

            Ok(Committed::new(
                SessionView::from(&user),
                "UPDATE_PROFILE",
                json!({ "user_id": user.id, "fields": fields }),
            ))
        })
        .await?;

    Ok(ApiResponse::success(view))
}
