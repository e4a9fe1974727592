// access/mod.rs - Property-scoped authorization
//
// A non-master actor may see or touch an entity only when the entity is linked
// to at least one property the actor is a member of. Denials surface as 404 so
// callers cannot discover ids they have no access to.

use uuid::Uuid;

use crate::database::models::{EntityKind, LinkedRecord, Property, User};
use crate::database::Store;
use crate::error::ApiError;

pub const PROPERTY_NOT_FOUND: &str = "Property not found or access denied";

/// Who is acting on a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
    pub is_master: bool,
}

impl From<&User> for Actor {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            is_master: user.is_master,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

/// Core predicate: masters pass, everyone else needs a shared property
pub fn evaluate(actor: &Actor, memberships: &[Uuid], linkage: &[Uuid]) -> Decision {
    if actor.is_master || linkage.iter().any(|id| memberships.contains(id)) {
        Decision::Allow
    } else {
        Decision::Deny
    }
}

async fn memberships(store: &dyn Store, actor: &Actor) -> Result<Vec<Uuid>, ApiError> {
    if actor.is_master {
        return Ok(Vec::new());
    }
    Ok(store.member_property_ids(actor.user_id).await?)
}

/// Load a linked record the actor may act on
pub async fn authorize_record(
    store: &dyn Store,
    actor: &Actor,
    kind: EntityKind,
    id: Uuid,
) -> Result<LinkedRecord, ApiError> {
    let record = store
        .find_record(kind, id)
        .await?
        .ok_or_else(|| ApiError::not_found(kind.not_found_message()))?;

    let memberships = memberships(store, actor).await?;
    match evaluate(actor, &memberships, &record.property_ids) {
        Decision::Allow => Ok(record),
        Decision::Deny => {
            tracing::debug!("{} {} denied to user {}", kind.label(), id, actor.user_id);
            Err(ApiError::not_found(kind.not_found_message()))
        }
    }
}

/// Load a property the actor is a member of (or any property for masters)
pub async fn authorize_property(store: &dyn Store, actor: &Actor, id: Uuid) -> Result<Property, ApiError> {
    let property = store
        .find_property(id)
        .await?
        .ok_or_else(|| ApiError::not_found(PROPERTY_NOT_FOUND))?;

    let memberships = memberships(store, actor).await?;
    match evaluate(actor, &memberships, &[property.id]) {
        Decision::Allow => Ok(property),
        Decision::Deny => Err(ApiError::not_found(PROPERTY_NOT_FOUND)),
    }
}

/// Every named property must exist and be accessible
pub async fn authorize_properties(store: &dyn Store, actor: &Actor, ids: &[Uuid]) -> Result<(), ApiError> {
    let memberships = memberships(store, actor).await?;
    for id in ids {
        if store.find_property(*id).await?.is_none() {
            return Err(ApiError::not_found(PROPERTY_NOT_FOUND));
        }
        if evaluate(actor, &memberships, &[*id]) == Decision::Deny {
            return Err(ApiError::not_found(PROPERTY_NOT_FOUND));
        }
    }
    Ok(())
}

/// Role gate for administrative endpoints
pub fn require_master(actor: &Actor) -> Result<(), ApiError> {
    if actor.is_master {
        Ok(())
    } else {
        Err(ApiError::access_denied("Master admin access required"))
    }
}
