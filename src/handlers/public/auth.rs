// handlers/public/auth.rs - POST /api/auth/register and POST /api/auth/login

use axum::extract::State;
use serde::{Deserialize, Serialize};
use serde_json::json;
use validator::Validate;

use crate::audit::{ActionTag, Committed, Origin};
use crate::auth::{hash_password_blocking, issue_token, verify_password_blocking};
use crate::database::models::{NewUser, User, UserStatus};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, ClientInfo, SessionView, ValidatedJson};
use crate::state::AppState;

const DEFAULT_TIMEZONE: &str = "UTC";

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "must be a valid email address"), length(max = 254))]
    pub email: String,
    #[validate(custom(function = "crate::validation::validate_name"))]
    pub name: String,
    #[validate(length(min = 8, max = 128, message = "must be 8 to 128 characters"))]
    pub password: String,
    #[validate(custom(function = "crate::validation::validate_timezone"))]
    pub timezone: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "is required"))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user: SessionView,
    /// Present only when the account is usable right away (the first user)
    pub token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_in: u64,
    pub user: SessionView,
}

/// POST /api/auth/register - Create an account
///
/// The first account on a fresh installation becomes an active master admin.
/// Every later account starts PENDING until a master approves it.
pub async fn register(
    State(state): State<AppState>,
    client: ClientInfo,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> ApiResult<RegisterResponse> {
    let email = req.email.trim().to_lowercase();
    let password_hash = hash_password_blocking(req.password).await?;
    let origin = Origin::new(None, &client);

    let user: User = state
        .audit
        .guard(&origin, "AUTH", async {
            let user = state
                .store
                .register_user(NewUser {
                    email,
                    name: req.name.trim().to_string(),
                    password_hash,
                    timezone: req.timezone.unwrap_or_else(|| DEFAULT_TIMEZONE.to_string()),
                })
                .await?;

            let details = json!({
                "user_id": user.id,
                "email": user.email,
                "status": user.status,
                "is_master": user.is_master,
            });
            let user_id = user.id;
            Ok(Committed::new(user, "REGISTER", details).by(user_id))
        })
        .await?;

    if user.is_master {
        tracing::info!("First account {} registered as master admin", user.email);
    }

    let token = if user.status == UserStatus::Active {
        Some(issue_token(&user, &state.config.security)?)
    } else {
        None
    };

    Ok(ApiResponse::created(RegisterResponse {
        user: SessionView::from(&user),
        token,
    }))
}

/// POST /api/auth/login - Exchange credentials for a bearer token
pub async fn login(
    State(state): State<AppState>,
    client: ClientInfo,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> ApiResult<LoginResponse> {
    let email = req.email.trim().to_lowercase();

    let found = state.store.find_user_by_email(&email).await?;
    let stored_hash = found.as_ref().map(|u| u.password_hash.clone());
    let verified = verify_password_blocking(req.password, stored_hash).await;

    let user = match found {
        Some(user) if verified => user,
        found => {
            let origin = Origin::new(found.as_ref().map(|u| u.id), &client);
            state
                .audit
                .record_detached(&origin, ActionTag::new("AUTH", "LOGIN_FAILED"), json!({ "email": email }));
            return Err(ApiError::unauthorized("Invalid email or password"));
        }
    };

    match user.status {
        UserStatus::Active => {}
        UserStatus::Pending => return Err(ApiError::access_denied("Account is pending approval")),
        UserStatus::Suspended => return Err(ApiError::access_denied("Account is suspended")),
    }

    let token = issue_token(&user, &state.config.security)?;

    let origin = Origin::new(Some(user.id), &client);
    state
        .audit
        .record(&origin, ActionTag::new("AUTH", "LOGIN"), json!({ "email": user.email }))
        .await;

    Ok(ApiResponse::success(LoginResponse {
        token,
        expires_in: state.config.security.jwt_expiry_hours * 3600,
        user: SessionView::from(&user),
    }))
}
