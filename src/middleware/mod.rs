pub mod auth;
pub mod client;
pub mod extract;
pub mod rate_limit;
pub mod response;
pub mod validate_user;

pub use auth::jwt_auth_middleware;
pub use client::ClientInfo;
pub use extract::{JsonBody, ValidatedJson};
pub use rate_limit::rate_limit_middleware;
pub use response::{ApiResponse, ApiResult};
pub use validate_user::{validate_user_middleware, Session, SessionView};
