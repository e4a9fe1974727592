use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use serde::Serialize;
use uuid::Uuid;

use crate::access::Actor;
use crate::auth::Claims;
use crate::database::models::{User, UserStatus};
use crate::error::ApiError;
use crate::state::AppState;

/// The authenticated, currently active user behind a request
#[derive(Clone, Debug)]
pub struct Session {
    pub user: User,
    pub actor: Actor,
}

impl Session {
    pub fn new(user: User) -> Self {
        let actor = Actor::from(&user);
        Self { user, actor }
    }

    pub fn user_id(&self) -> Uuid {
        self.user.id
    }

    pub fn view(&self) -> SessionView {
        SessionView::from(&self.user)
    }
}

/// Session as returned to clients
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub is_master: bool,
    pub status: UserStatus,
    pub timezone: String,
}

impl From<&User> for SessionView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            is_master: user.is_master,
            status: user.status,
            timezone: user.timezone.clone(),
        }
    }
}

/// Middleware that re-reads the token's user so approvals, suspensions and
/// deletions apply to tokens that were issued before them
pub async fn validate_user_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let claims = request
        .extensions()
        .get::<Claims>()
        .cloned()
        .ok_or_else(|| ApiError::unauthorized("JWT authentication required before user validation"))?;

    let user = state.store.find_user(claims.sub).await?.ok_or_else(|| {
        tracing::warn!("User validation failed: user {} no longer exists", claims.sub);
        ApiError::unauthorized("User no longer exists")
    })?;

    match user.status {
        UserStatus::Active => {}
        UserStatus::Pending => {
            return Err(ApiError::access_denied("Account is pending approval"));
        }
        UserStatus::Suspended => {
            tracing::warn!("User validation failed: user {} is suspended", user.id);
            return Err(ApiError::access_denied("Account is suspended"));
        }
    }

    tracing::debug!("User validation successful: {} (master={})", user.email, user.is_master);

    request.extensions_mut().insert(Session::new(user));
    Ok(next.run(request).await)
}
