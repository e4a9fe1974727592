// handlers/public/mod.rs - Endpoints that need no authentication
//
// Service descriptor, health, registration and login.

pub mod auth;
pub mod health;

pub use auth::{login, register};
pub use health::{health, root};
