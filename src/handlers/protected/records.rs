// handlers/protected/records.rs - Linked-record routes shared by every kind
//
// Campaigns, affiliates, ad networks and advertisers use the same handlers;
// the router attaches the `EntityKind` as an extension per route group.
// Validation runs before any authorization lookup.

use axum::extract::{Extension, Path, Query, State};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::access::{self, PROPERTY_NOT_FOUND};
use crate::audit::{Committed, Origin};
use crate::database::models::{EntityKind, LinkedRecord};
use crate::error::ApiError;
use crate::handlers::path_id;
use crate::middleware::{ApiResponse, ApiResult, ClientInfo, JsonBody, Session};
use crate::state::AppState;
use crate::validation::{self, Mode};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub property_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LinkRequest {
    pub property_id: String,
}

fn property_id_field(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw.trim()).map_err(|_| ApiError::invalid_field("property_id", "must be a property id"))
}

/// GET /api/<kind>?property_id= - Records linked to the caller's properties
pub async fn list(
    State(state): State<AppState>,
    Extension(kind): Extension<EntityKind>,
    Extension(session): Extension<Session>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<LinkedRecord>> {
    let property_id = query
        .property_id
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .map(property_id_field)
        .transpose()?;

    if let Some(property_id) = property_id {
        access::authorize_property(state.store.as_ref(), &session.actor, property_id).await?;
    }

    let records = state.store.list_records(kind, &session.actor, property_id).await?;
    let total = records.len();
    Ok(ApiResponse::success(records).with_meta(json!({ "total": total })))
}

/// POST /api/<kind> - Create a record linked to one or more properties
pub async fn create(
    State(state): State<AppState>,
    Extension(kind): Extension<EntityKind>,
    Extension(session): Extension<Session>,
    client: ClientInfo,
    JsonBody(mut body): JsonBody<Map<String, Value>>,
) -> ApiResult<LinkedRecord> {
    let property_ids = validation::parse_property_ids(body.remove("property_ids").as_ref())?;
    let values = validation::record_values(kind, &body, Mode::Create)?;
    validation::check_date_range(kind, &values, None)?;

    let origin = Origin::new(Some(session.user_id()), &client);
    let record = state
        .audit
        .guard(&origin, kind.audit_domain(), async {
            access::authorize_properties(state.store.as_ref(), &session.actor, &property_ids).await?;

            let record = state.store.create_record(kind, &values, &property_ids).await?;
            let details = json!({
                "id": record.id,
                "name": record.attributes.get("name"),
                "property_ids": property_ids,
            });
            Ok(Committed::new(record, "CREATE", details))
        })
        .await?;

    Ok(ApiResponse::created(record))
}

/// GET /api/<kind>/:id
pub async fn get(
    State(state): State<AppState>,
    Extension(kind): Extension<EntityKind>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> ApiResult<LinkedRecord> {
    let id = path_id(&id, kind.not_found_message())?;
    let record = access::authorize_record(state.store.as_ref(), &session.actor, kind, id).await?;
    Ok(ApiResponse::success(record))
}

/// PUT /api/<kind>/:id - Partial update; links change through the link routes
pub async fn update(
    State(state): State<AppState>,
    Extension(kind): Extension<EntityKind>,
    Extension(session): Extension<Session>,
    client: ClientInfo,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<Map<String, Value>>,
) -> ApiResult<LinkedRecord> {
    let id = path_id(&id, kind.not_found_message())?;

    if body.contains_key("property_ids") {
        return Err(ApiError::invalid_field(
            "property_ids",
            "links are changed through the /properties sub-resource",
        ));
    }
    let values = validation::record_values(kind, &body, Mode::Update)?;
    if values.is_empty() {
        return Err(ApiError::validation("No changes supplied", None));
    }

    let origin = Origin::new(Some(session.user_id()), &client);
    let record = state
        .audit
        .guard(&origin, kind.audit_domain(), async {
            let existing = access::authorize_record(state.store.as_ref(), &session.actor, kind, id).await?;
            validation::check_date_range(kind, &values, Some(&existing))?;

            let record = state
                .store
                .update_record(kind, id, &values)
                .await?
                .ok_or_else(|| ApiError::not_found(kind.not_found_message()))?;

            Ok(Committed::new(
                record,
                "UPDATE",
                json!({ "id": id, "fields": validation::changed_fields(&values) }),
            ))
        })
        .await?;

    Ok(ApiResponse::success(record))
}

/// DELETE /api/<kind>/:id
pub async fn delete(
    State(state): State<AppState>,
    Extension(kind): Extension<EntityKind>,
    Extension(session): Extension<Session>,
    client: ClientInfo,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    let id = path_id(&id, kind.not_found_message())?;

    let origin = Origin::new(Some(session.user_id()), &client);
    let deleted = state
        .audit
        .guard(&origin, kind.audit_domain(), async {
            let record = access::authorize_record(state.store.as_ref(), &session.actor, kind, id).await?;
            if !state.store.delete_record(kind, id).await? {
                return Err(ApiError::not_found(kind.not_found_message()));
            }
            Ok(Committed::new(
                json!({ "id": id, "deleted": true }),
                "DELETE",
                json!({
                    "id": id,
                    "name": record.attributes.get("name"),
                    "property_ids": record.property_ids,
                }),
            ))
        })
        .await?;

    Ok(ApiResponse::success(deleted))
}

/// POST /api/<kind>/:id/properties - Link the record to another property
pub async fn link_property(
    State(state): State<AppState>,
    Extension(kind): Extension<EntityKind>,
    Extension(session): Extension<Session>,
    client: ClientInfo,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<LinkRequest>,
) -> ApiResult<LinkedRecord> {
    let id = path_id(&id, kind.not_found_message())?;
    let property_id = property_id_field(&req.property_id)?;

    let origin = Origin::new(Some(session.user_id()), &client);
    let record = state
        .audit
        .guard(&origin, kind.audit_domain(), async {
            access::authorize_record(state.store.as_ref(), &session.actor, kind, id).await?;
            access::authorize_property(state.store.as_ref(), &session.actor, property_id).await?;

            if !state.store.link_record(kind, id, property_id).await? {
                return Err(ApiError::conflict(format!(
                    "{} is already linked to this property",
                    kind.label()
                )));
            }

            let record = state
                .store
                .find_record(kind, id)
                .await?
                .ok_or_else(|| ApiError::not_found(kind.not_found_message()))?;

            Ok(Committed::new(
                record,
                "LINK_PROPERTY",
                json!({ "id": id, "property_id": property_id }),
            ))
        })
        .await?;

    Ok(ApiResponse::created(record))
}

/// DELETE /api/<kind>/:id/properties/:property_id - Remove one link.
/// The record survives even when this was its last link.
pub async fn unlink_property(
    State(state): State<AppState>,
    Extension(kind): Extension<EntityKind>,
    Extension(session): Extension<Session>,
    client: ClientInfo,
    Path((id, property_id)): Path<(String, String)>,
) -> ApiResult<LinkedRecord> {
    let id = path_id(&id, kind.not_found_message())?;
    let property_id = path_id(&property_id, PROPERTY_NOT_FOUND)?;

    let origin = Origin::new(Some(session.user_id()), &client);
    let record = state
        .audit
        .guard(&origin, kind.audit_domain(), async {
            access::authorize_record(state.store.as_ref(), &session.actor, kind, id).await?;
            access::authorize_property(state.store.as_ref(), &session.actor, property_id).await?;

            if !state.store.unlink_record(kind, id, property_id).await? {
                return Err(ApiError::not_found("Link not found"));
            }

            let record = state
                .store
                .find_record(kind, id)
                .await?
                .ok_or_else(|| ApiError::not_found(kind.not_found_message()))?;

            Ok(Committed::new(
                record,
                "UNLINK_PROPERTY",
                json!({ "id": id, "property_id": property_id }),
            ))
        })
        .await?;

    Ok(ApiResponse::success(record))
}
