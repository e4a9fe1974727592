// handlers/mod.rs - Three-tier handler layout
//
// Public (no auth) → Protected (bearer token + active user) → Elevated (master only)

pub mod elevated;
pub mod protected;
pub mod public;

use serde::{Deserialize, Deserializer};
use uuid::Uuid;

use crate::error::ApiError;

/// Path ids that are not UUIDs cannot name anything, so they read as missing
pub(crate) fn path_id(raw: &str, not_found: impl Into<String>) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::not_found(not_found))
}

/// Distinguish an absent field (`None`) from an explicit null (`Some(None)`)
pub(crate) fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
