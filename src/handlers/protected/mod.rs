// handlers/protected/mod.rs - Handlers behind bearer-token authentication
//
// Every route here runs after `jwt_auth_middleware` and
// `validate_user_middleware`, so a `Session` extension for an ACTIVE user is
// always present. Entity access is scoped by property membership.

pub mod activity;
pub mod members;
pub mod properties;
pub mod records;
pub mod session;
