// handlers/protected/properties.rs - /api/properties CRUD
//
// Any active user may create a property and becomes its first member.
// Reads and writes on a specific property require membership (or master).

use axum::extract::{Extension, Path, State};
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use crate::access::{self, PROPERTY_NOT_FOUND};
use crate::audit::{Committed, Origin};
use crate::database::models::{NewProperty, Property, PropertyChanges, PropertyStatus};
use crate::error::ApiError;
use crate::handlers::{double_option, path_id};
use crate::middleware::{ApiResponse, ApiResult, ClientInfo, Session, ValidatedJson};
use crate::state::AppState;
use crate::validation::{normalize_domain, normalize_tags};

const MAX_INDUSTRY_LEN: usize = 100;

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct CreatePropertyRequest {
    #[validate(custom(function = "crate::validation::validate_name"))]
    pub name: String,
    #[validate(custom(function = "crate::validation::validate_domain"))]
    pub domain: String,
    pub status: Option<PropertyStatus>,
    #[validate(length(max = 50, message = "at most 50 tags"))]
    pub tags: Option<Vec<String>>,
    #[validate(length(max = 100, message = "must be at most 100 characters"))]
    pub industry: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct UpdatePropertyRequest {
    #[validate(custom(function = "crate::validation::validate_name"))]
    pub name: Option<String>,
    #[validate(custom(function = "crate::validation::validate_domain"))]
    pub domain: Option<String>,
    pub status: Option<PropertyStatus>,
    #[validate(length(max = 50, message = "at most 50 tags"))]
    pub tags: Option<Vec<String>>,
    /// `null` clears the industry
    #[serde(default, deserialize_with = "double_option")]
    pub industry: Option<Option<String>>,
}

fn domain_of(raw: &str) -> Result<String, ApiError> {
    normalize_domain(raw).map_err(|e| {
        let message = e.message.map(|m| m.to_string()).unwrap_or_else(|| "is invalid".to_string());
        ApiError::invalid_field("domain", message)
    })
}

fn clean_industry(industry: Option<String>) -> Option<String> {
    industry.map(|i| i.trim().to_string()).filter(|i| !i.is_empty())
}

/// GET /api/properties - Properties the caller belongs to (all, for masters)
pub async fn list(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<Vec<Property>> {
    let properties = state.store.list_properties(&session.actor).await?;
    let total = properties.len();
    Ok(ApiResponse::success(properties).with_meta(json!({ "total": total })))
}

/// POST /api/properties - Create a property; the caller becomes a member
pub async fn create(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    client: ClientInfo,
    ValidatedJson(req): ValidatedJson<CreatePropertyRequest>,
) -> ApiResult<Property> {
    let new_property = NewProperty {
        name: req.name.trim().to_string(),
        domain: domain_of(&req.domain)?,
        status: req.status.unwrap_or(PropertyStatus::Active),
        tags: normalize_tags(&req.tags.unwrap_or_default()),
        industry: clean_industry(req.industry),
    };

    let origin = Origin::new(Some(session.user_id()), &client);
    let property = state
        .audit
        .guard(&origin, "PROPERTY", async {
            let property = state.store.create_property(new_property, session.user_id()).await?;
            let details = json!({
                "property_id": property.id,
                "name": property.name,
                "domain": property.domain,
            });
            Ok(Committed::new(property, "CREATE", details))
        })
        .await?;

    Ok(ApiResponse::created(property))
}

/// GET /api/properties/:id
pub async fn get(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> ApiResult<Property> {
    let id = path_id(&id, PROPERTY_NOT_FOUND)?;
    let property = access::authorize_property(state.store.as_ref(), &session.actor, id).await?;
    Ok(ApiResponse::success(property))
}

/// PUT /api/properties/:id - Partial update
pub async fn update(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    client: ClientInfo,
    Path(id): Path<String>,
    ValidatedJson(req): ValidatedJson<UpdatePropertyRequest>,
) -> ApiResult<Property> {
    let id = path_id(&id, PROPERTY_NOT_FOUND)?;

    if let Some(Some(industry)) = &req.industry {
        if industry.chars().count() > MAX_INDUSTRY_LEN {
            return Err(ApiError::invalid_field("industry", "must be at most 100 characters"));
        }
    }

    let changes = PropertyChanges {
        name: req.name.map(|n| n.trim().to_string()),
        domain: req.domain.as_deref().map(domain_of).transpose()?,
        status: req.status,
        tags: req.tags.map(|t| normalize_tags(&t)),
        industry: req.industry.map(clean_industry),
    };
    if changes.is_empty() {
        return Err(ApiError::validation("No changes supplied", None));
    }

    let origin = Origin::new(Some(session.user_id()), &client);
    let property = state
        .audit
        .guard(&origin, "PROPERTY", async {
            access::authorize_property(state.store.as_ref(), &session.actor, id).await?;

            let mut fields = Vec::new();
            if changes.name.is_some() {
                fields.push("name");
            }
            if changes.domain.is_some() {
                fields.push("domain");
            }
            if changes.status.is_some() {
                fields.push("status");
            }
            if changes.tags.is_some() {
                fields.push("tags");
            }
            if changes.industry.is_some() {
                fields.push("industry");
            }

            let property = state
                .store
                .update_property(id, changes)
                .await?
                .ok_or_else(|| ApiError::not_found(PROPERTY_NOT_FOUND))?;

            Ok(Committed::new(
                property,
                "UPDATE",
                json!({ "property_id": id, "fields": fields }),
            ))
        })
        .await?;

    Ok(ApiResponse::success(property))
}

/// DELETE /api/properties/:id - Memberships and record links go with it;
/// the linked records themselves stay
pub async fn delete(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    client: ClientInfo,
    Path(id): Path<String>,
) -> ApiResult<serde_json::Value> {
    let id = path_id(&id, PROPERTY_NOT_FOUND)?;

    let origin = Origin::new(Some(session.user_id()), &client);
    let deleted = state
        .audit
        .guard(&origin, "PROPERTY", async {
            let property = access::authorize_property(state.store.as_ref(), &session.actor, id).await?;
            if !state.store.delete_property(id).await? {
                return Err(ApiError::not_found(PROPERTY_NOT_FOUND));
            }
            Ok(Committed::new(
                json!({ "id": id, "deleted": true }),
                "DELETE",
                json!({ "property_id": id, "name": property.name, "domain": property.domain }),
            ))
        })
        .await?;

    Ok(ApiResponse::success(deleted))
}
