pub mod access;
pub mod audit;
pub mod auth;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod rate_limit;
pub mod state;
pub mod validation;

#[cfg(test)]
pub mod testing;

use axum::{
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{delete, get, post, put},
    Extension, Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

use crate::config::{AppConfig, Environment};
use crate::database::models::EntityKind;
use crate::error::ApiError;
use crate::handlers::{elevated, protected, public};
use crate::middleware::{jwt_auth_middleware, rate_limit_middleware, validate_user_middleware};
use crate::state::AppState;

/// Build the full application router
pub fn app(state: AppState) -> Router {
    let max_body = state.config.api.max_request_size_bytes;
    let cors = cors_layer(&state.config);

    Router::new()
        .merge(public_routes())
        .merge(protected_routes(state.clone()))
        .fallback(route_not_found)
        .layer(from_fn_with_state(state.clone(), rate_limit_middleware))
        .layer(RequestBodyLimitLayer::new(max_body))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(public::root))
        .route("/health", get(public::health))
        .route("/api/auth/register", post(public::register))
        .route("/api/auth/login", post(public::login))
}

/// Routes behind token authentication and user revalidation
fn protected_routes(state: AppState) -> Router<AppState> {
    use protected::{activity, members, properties, session};

    let mut router = Router::new()
        // Session and profile
        .route("/api/auth/session", get(session::session))
        .route("/api/profile", put(session::update_profile))
        // Properties and membership
        .route("/api/properties", get(properties::list).post(properties::create))
        .route(
            "/api/properties/:id",
            get(properties::get).put(properties::update).delete(properties::delete),
        )
        .route("/api/properties/:id/members", get(members::list).post(members::add))
        .route("/api/properties/:id/members/:user_id", delete(members::remove))
        // Activity
        .route("/api/activity", get(activity::list))
        // Elevated (master only, enforced per handler)
        .route("/api/admin/users", get(elevated::users::list))
        .route("/api/admin/users/:id", delete(elevated::users::delete))
        .route("/api/admin/users/:id/approve", post(elevated::users::approve))
        .route("/api/admin/users/:id/suspend", post(elevated::users::suspend));

    for kind in EntityKind::ALL {
        router = router.merge(record_routes(kind));
    }

    router
        .route_layer(from_fn_with_state(state.clone(), validate_user_middleware))
        .route_layer(from_fn_with_state(state, jwt_auth_middleware))
}

/// The same handlers serve every linked-record kind
fn record_routes(kind: EntityKind) -> Router<AppState> {
    use protected::records;

    let base = format!("/api/{}", kind.route_segment());

    Router::new()
        .route(&base, get(records::list).post(records::create))
        .route(
            &format!("{}/:id", base),
            get(records::get).put(records::update).delete(records::delete),
        )
        .route(&format!("{}/:id/properties", base), post(records::link_property))
        .route(
            &format!("{}/:id/properties/:property_id", base),
            delete(records::unlink_property),
        )
        .layer(Extension(kind))
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    if config.environment == Environment::Development {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .security
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

async fn route_not_found() -> ApiError {
    ApiError::not_found("Route not found")
}
