use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PropertyStatus {
    Active,
    Inactive,
    Archived,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown property status: {0}")]
pub struct UnknownPropertyStatus(String);

impl PropertyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyStatus::Active => "ACTIVE",
            PropertyStatus::Inactive => "INACTIVE",
            PropertyStatus::Archived => "ARCHIVED",
        }
    }
}

impl TryFrom<String> for PropertyStatus {
    type Error = UnknownPropertyStatus;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "ACTIVE" => Ok(PropertyStatus::Active),
            "INACTIVE" => Ok(PropertyStatus::Inactive),
            "ARCHIVED" => Ok(PropertyStatus::Archived),
            _ => Err(UnknownPropertyStatus(value)),
        }
    }
}

/// A site or brand; membership in a property is the unit of access
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Property {
    pub id: Uuid,
    pub name: String,
    pub domain: String,
    #[sqlx(try_from = "String")]
    pub status: PropertyStatus,
    pub tags: Vec<String>,
    pub industry: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewProperty {
    pub name: String,
    pub domain: String,
    pub status: PropertyStatus,
    pub tags: Vec<String>,
    pub industry: Option<String>,
}

/// Partial update; `industry: Some(None)` clears the column
#[derive(Debug, Clone, Default)]
pub struct PropertyChanges {
    pub name: Option<String>,
    pub domain: Option<String>,
    pub status: Option<PropertyStatus>,
    pub tags: Option<Vec<String>>,
    pub industry: Option<Option<String>>,
}

impl PropertyChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.domain.is_none()
            && self.status.is_none()
            && self.tags.is_none()
            && self.industry.is_none()
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Member {
    pub user_id: Uuid,
    pub email: String,
    pub name: String,
    pub joined_at: DateTime<Utc>,
}
