use chrono::{DateTime, NaiveDate, Utc};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::database::manager::DatabaseError;

/// Fields maintained by the store; never accepted from API input
pub const SYSTEM_FIELDS: &[&str] = &["id", "created_at", "updated_at", "property_ids"];

/// Entity types whose access derives from the properties they are linked to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Campaign,
    Affiliate,
    AdNetwork,
    Advertiser,
}

/// Value shape accepted for a column
#[derive(Debug, Clone, Copy)]
pub enum ColumnType {
    Text { max_len: usize },
    Email,
    Url,
    Number { min: f64, max: Option<f64> },
    Date,
    Choice(&'static [&'static str]),
}

#[derive(Debug, Clone, Copy)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub column_type: ColumnType,
    pub required: bool,
    pub default: Option<&'static str>,
}

const fn column(name: &'static str, column_type: ColumnType) -> ColumnSpec {
    ColumnSpec {
        name,
        column_type,
        required: false,
        default: None,
    }
}

const NAME: ColumnSpec = ColumnSpec {
    name: "name",
    column_type: ColumnType::Text { max_len: 200 },
    required: true,
    default: None,
};

const CAMPAIGN_COLUMNS: &[ColumnSpec] = &[
    NAME,
    column("description", ColumnType::Text { max_len: 2000 }),
    ColumnSpec {
        name: "status",
        column_type: ColumnType::Choice(&["DRAFT", "ACTIVE", "PAUSED", "COMPLETED"]),
        required: false,
        default: Some("DRAFT"),
    },
    column("start_date", ColumnType::Date),
    column("end_date", ColumnType::Date),
    column("budget", ColumnType::Number { min: 0.0, max: None }),
];

const AFFILIATE_COLUMNS: &[ColumnSpec] = &[
    NAME,
    column("email", ColumnType::Email),
    column("website", ColumnType::Url),
    column("commission_rate", ColumnType::Number { min: 0.0, max: Some(100.0) }),
    ColumnSpec {
        name: "status",
        column_type: ColumnType::Choice(&["PENDING", "ACTIVE", "INACTIVE"]),
        required: false,
        default: Some("PENDING"),
    },
];

const AD_NETWORK_COLUMNS: &[ColumnSpec] = &[
    NAME,
    column("website", ColumnType::Url),
    column("account_id", ColumnType::Text { max_len: 200 }),
    ColumnSpec {
        name: "status",
        column_type: ColumnType::Choice(&["ACTIVE", "INACTIVE"]),
        required: false,
        default: Some("ACTIVE"),
    },
];

const ADVERTISER_COLUMNS: &[ColumnSpec] = &[
    NAME,
    column("contact_name", ColumnType::Text { max_len: 200 }),
    column("contact_email", ColumnType::Email),
    column("website", ColumnType::Url),
    ColumnSpec {
        name: "status",
        column_type: ColumnType::Choice(&["ACTIVE", "INACTIVE"]),
        required: false,
        default: Some("ACTIVE"),
    },
];

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Campaign,
        EntityKind::Affiliate,
        EntityKind::AdNetwork,
        EntityKind::Advertiser,
    ];

    pub fn table(self) -> &'static str {
        match self {
            EntityKind::Campaign => "campaigns",
            EntityKind::Affiliate => "affiliates",
            EntityKind::AdNetwork => "ad_networks",
            EntityKind::Advertiser => "advertisers",
        }
    }

    pub fn link_table(self) -> &'static str {
        match self {
            EntityKind::Campaign => "campaign_properties",
            EntityKind::Affiliate => "affiliate_properties",
            EntityKind::AdNetwork => "ad_network_properties",
            EntityKind::Advertiser => "advertiser_properties",
        }
    }

    /// Foreign key column in the link table pointing at this entity
    pub fn link_column(self) -> &'static str {
        match self {
            EntityKind::Campaign => "campaign_id",
            EntityKind::Affiliate => "affiliate_id",
            EntityKind::AdNetwork => "ad_network_id",
            EntityKind::Advertiser => "advertiser_id",
        }
    }

    /// Bracketed context used in activity action tags
    pub fn audit_domain(self) -> &'static str {
        match self {
            EntityKind::Campaign => "CAMPAIGN",
            EntityKind::Affiliate => "AFFILIATE",
            EntityKind::AdNetwork => "AD_NETWORK",
            EntityKind::Advertiser => "ADVERTISER",
        }
    }

    pub fn route_segment(self) -> &'static str {
        match self {
            EntityKind::Campaign => "campaigns",
            EntityKind::Affiliate => "affiliates",
            EntityKind::AdNetwork => "ad-networks",
            EntityKind::Advertiser => "advertisers",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            EntityKind::Campaign => "Campaign",
            EntityKind::Affiliate => "Affiliate",
            EntityKind::AdNetwork => "Ad network",
            EntityKind::Advertiser => "Advertiser",
        }
    }

    pub fn columns(self) -> &'static [ColumnSpec] {
        match self {
            EntityKind::Campaign => CAMPAIGN_COLUMNS,
            EntityKind::Affiliate => AFFILIATE_COLUMNS,
            EntityKind::AdNetwork => AD_NETWORK_COLUMNS,
            EntityKind::Advertiser => ADVERTISER_COLUMNS,
        }
    }

    pub fn column(self, name: &str) -> Option<&'static ColumnSpec> {
        self.columns().iter().find(|c| c.name == name)
    }

    /// Pair of date columns where the second may not precede the first
    pub fn date_range(self) -> Option<(&'static str, &'static str)> {
        match self {
            EntityKind::Campaign => Some(("start_date", "end_date")),
            _ => None,
        }
    }

    pub fn not_found_message(self) -> String {
        format!("{} not found or access denied", self.label())
    }
}

/// A typed column value ready to bind; `None` writes NULL
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Text(Option<String>),
    Number(Option<f64>),
    Date(Option<NaiveDate>),
}

impl ColumnValue {
    pub fn is_null(&self) -> bool {
        matches!(
            self,
            ColumnValue::Text(None) | ColumnValue::Number(None) | ColumnValue::Date(None)
        )
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            ColumnValue::Date(d) => *d,
            _ => None,
        }
    }

    /// JSON rendering matching what Postgres `row_to_json` produces
    pub fn to_json(&self) -> Value {
        match self {
            ColumnValue::Text(Some(s)) => Value::String(s.clone()),
            ColumnValue::Number(Some(n)) => {
                serde_json::Number::from_f64(*n).map(Value::Number).unwrap_or(Value::Null)
            }
            ColumnValue::Date(Some(d)) => Value::String(d.format("%Y-%m-%d").to_string()),
            _ => Value::Null,
        }
    }
}

/// Validated column assignments for one insert or update, in schema order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordValues(Vec<(&'static str, ColumnValue)>);

impl RecordValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, column: &'static str, value: ColumnValue) {
        self.0.push((column, value));
    }

    pub fn get(&self, column: &str) -> Option<&ColumnValue> {
        self.0.iter().find(|(name, _)| *name == column).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(&'static str, ColumnValue)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .0
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_json()))
            .collect();
        Value::Object(map)
    }
}

/// A campaign, affiliate, ad network or advertiser with its property links
#[derive(Debug, Clone, Serialize)]
pub struct LinkedRecord {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: EntityKind,
    pub attributes: Map<String, Value>,
    #[serde(serialize_with = "sorted_ids")]
    pub property_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn sorted_ids<S: Serializer>(ids: &[Uuid], serializer: S) -> Result<S::Ok, S::Error> {
    let mut ids = ids.to_vec();
    ids.sort();
    ids.serialize(serializer)
}

impl LinkedRecord {
    /// Build from a `row_to_json` object holding the entity columns plus `property_ids`
    pub fn from_row_json(kind: EntityKind, row: Value) -> Result<Self, DatabaseError> {
        let Value::Object(mut map) = row else {
            return Err(DatabaseError::QueryError("unexpected record format".to_string()));
        };

        let id = take_field::<Uuid>(&mut map, "id")?;
        let created_at = take_field::<DateTime<Utc>>(&mut map, "created_at")?;
        let updated_at = take_field::<DateTime<Utc>>(&mut map, "updated_at")?;
        let property_ids = match map.remove("property_ids") {
            Some(Value::Null) | None => Vec::new(),
            Some(v) => serde_json::from_value::<Vec<Uuid>>(v)
                .map_err(|e| DatabaseError::QueryError(format!("property_ids: {}", e)))?,
        };

        // Keep only schema columns, in case the table grows columns the API does not expose
        map.retain(|k, _| kind.column(k).is_some());

        Ok(Self {
            id,
            kind,
            attributes: map,
            property_ids,
            created_at,
            updated_at,
        })
    }

    pub fn is_linked_to(&self, property_id: Uuid) -> bool {
        self.property_ids.contains(&property_id)
    }

    /// Current date for a column, if set
    pub fn date(&self, column: &str) -> Option<NaiveDate> {
        self.attributes
            .get(column)
            .and_then(Value::as_str)
            .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
    }
}

fn take_field<T: serde::de::DeserializeOwned>(
    map: &mut Map<String, Value>,
    field: &str,
) -> Result<T, DatabaseError> {
    let value = map
        .remove(field)
        .ok_or_else(|| DatabaseError::QueryError(format!("record row missing '{}'", field)))?;
    serde_json::from_value(value).map_err(|e| DatabaseError::QueryError(format!("{}: {}", field, e)))
}
