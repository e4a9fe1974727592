// testing/mod.rs - In-memory store and router harness for unit tests
//
// `MemoryStore` follows the Postgres store's observable behavior: the first
// registered user becomes master, emails and domains are unique, deleting a
// property or user cascades to memberships and links, and scoped reads only
// return rows linked to the actor's properties.


use async_trait::async_trait;
use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use serde_json::{Map, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower::ServiceExt;
use uuid::Uuid;

use crate::access::Actor;
use crate::auth::issue_token;
use crate::config::AppConfig;
use crate::database::models::user::initial_standing;
use crate::database::models::{
    ActivityFilter, ActivityLog, ColumnValue, EntityKind, LinkedRecord, Member, NewActivity, NewProperty,
    NewUser, ProfileChanges, Property, PropertyChanges, PropertyStatus, RecordValues, User, UserStatus,
};
use crate::database::{DatabaseError, Store};
use crate::rate_limit::RateLimiter;
use crate::state::AppState;

struct Membership {
    property_id: Uuid,
    user_id: Uuid,
    joined_at: chrono::DateTime<Utc>,
}

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    properties: Vec<Property>,
    members: Vec<Membership>,
    records: Vec<LinkedRecord>,
    activity: Vec<ActivityLog>,
}

impl Tables {
    fn memberships_of(&self, user_id: Uuid) -> Vec<Uuid> {
        self.members
            .iter()
            .filter(|m| m.user_id == user_id)
            .map(|m| m.property_id)
            .collect()
    }

    fn domain_taken(&self, domain: &str, except: Option<Uuid>) -> bool {
        self.properties
            .iter()
            .any(|p| p.domain == domain && Some(p.id) != except)
    }

    fn record_mut(&mut self, kind: EntityKind, id: Uuid) -> Option<&mut LinkedRecord> {
        self.records.iter_mut().find(|r| r.kind == kind && r.id == id)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    fail_activity: AtomicBool,
    unhealthy: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every activity insert fail, as if the log table were unavailable
    pub fn fail_activity_writes(&self, fail: bool) {
        self.fail_activity.store(fail, Ordering::SeqCst);
    }

    pub fn set_unhealthy(&self, unhealthy: bool) {
        self.unhealthy.store(unhealthy, Ordering::SeqCst);
    }

    /// Insert an active user directly, bypassing registration
    pub async fn seed_user(&self, email: &str, is_master: bool) -> User {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            name: email.split('@').next().unwrap_or(email).to_string(),
            password_hash: "unusable".to_string(),
            status: UserStatus::Active,
            is_master,
            timezone: "UTC".to_string(),
            created_at: now,
            updated_at: now,
        };
        self.tables.lock().await.users.push(user.clone());
        user
    }

    pub async fn seed_property(&self, owner: Uuid, domain: &str) -> Property {
        let new_property = NewProperty {
            name: domain.to_string(),
            domain: domain.to_string(),
            status: PropertyStatus::Active,
            tags: Vec::new(),
            industry: None,
        };
        self.create_property(new_property, owner).await.unwrap()
    }

    pub async fn seed_record(&self, kind: EntityKind, name: &str, property_ids: &[Uuid]) -> LinkedRecord {
        let mut values = RecordValues::new();
        values.push("name", ColumnValue::Text(Some(name.to_string())));
        self.create_record(kind, &values, property_ids).await.unwrap()
    }

    /// Every action tag written so far, oldest first
    pub async fn actions(&self) -> Vec<String> {
        self.tables
            .lock()
            .await
            .activity
            .iter()
            .map(|a| a.action.clone())
            .collect()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn health_check(&self) -> Result<(), DatabaseError> {
        if self.unhealthy.load(Ordering::SeqCst) {
            return Err(DatabaseError::QueryError("database unavailable".to_string()));
        }
        Ok(())
    }

    async fn register_user(&self, new_user: NewUser) -> Result<User, DatabaseError> {
        let mut tables = self.tables.lock().await;
        if tables.users.iter().any(|u| u.email == new_user.email) {
            return Err(DatabaseError::Conflict("A user with this email already exists".to_string()));
        }

        let (status, is_master) = initial_standing(tables.users.len() as i64);
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: new_user.email,
            name: new_user.name,
            password_hash: new_user.password_hash,
            status,
            is_master,
            timezone: new_user.timezone,
            created_at: now,
            updated_at: now,
        };
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, DatabaseError> {
        let tables = self.tables.lock().await;
        Ok(tables.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        let tables = self.tables.lock().await;
        Ok(tables.users.iter().find(|u| u.email == email).cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>, DatabaseError> {
        Ok(self.tables.lock().await.users.clone())
    }

    async fn set_user_status(&self, id: Uuid, status: UserStatus) -> Result<Option<User>, DatabaseError> {
        let mut tables = self.tables.lock().await;
        Ok(tables.users.iter_mut().find(|u| u.id == id).map(|user| {
            user.status = status;
            user.updated_at = Utc::now();
            user.clone()
        }))
    }

    async fn update_profile(&self, id: Uuid, changes: ProfileChanges) -> Result<Option<User>, DatabaseError> {
        let mut tables = self.tables.lock().await;
        Ok(tables.users.iter_mut().find(|u| u.id == id).map(|user| {
            if let Some(name) = changes.name {
                user.name = name;
            }
            if let Some(timezone) = changes.timezone {
                user.timezone = timezone;
            }
            user.updated_at = Utc::now();
            user.clone()
        }))
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let mut tables = self.tables.lock().await;
        let before = tables.users.len();
        tables.users.retain(|u| u.id != id);
        tables.members.retain(|m| m.user_id != id);
        Ok(tables.users.len() < before)
    }

    async fn member_property_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>, DatabaseError> {
        Ok(self.tables.lock().await.memberships_of(user_id))
    }

    async fn list_properties(&self, actor: &Actor) -> Result<Vec<Property>, DatabaseError> {
        let tables = self.tables.lock().await;
        let memberships = tables.memberships_of(actor.user_id);
        let mut properties: Vec<Property> = tables
            .properties
            .iter()
            .filter(|p| actor.is_master || memberships.contains(&p.id))
            .cloned()
            .collect();
        properties.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(properties)
    }

    async fn find_property(&self, id: Uuid) -> Result<Option<Property>, DatabaseError> {
        let tables = self.tables.lock().await;
        Ok(tables.properties.iter().find(|p| p.id == id).cloned())
    }

    async fn create_property(&self, new_property: NewProperty, owner: Uuid) -> Result<Property, DatabaseError> {
        let mut tables = self.tables.lock().await;
        if tables.domain_taken(&new_property.domain, None) {
            return Err(DatabaseError::Conflict("A property with this domain already exists".to_string()));
        }

        let now = Utc::now();
        let property = Property {
            id: Uuid::new_v4(),
            name: new_property.name,
            domain: new_property.domain,
            status: new_property.status,
            tags: new_property.tags,
            industry: new_property.industry,
            created_at: now,
            updated_at: now,
        };
        tables.properties.push(property.clone());
        tables.members.push(Membership {
            property_id: property.id,
            user_id: owner,
            joined_at: now,
        });
        Ok(property)
    }

    async fn update_property(&self, id: Uuid, changes: PropertyChanges) -> Result<Option<Property>, DatabaseError> {
        let mut tables = self.tables.lock().await;
        if let Some(domain) = &changes.domain {
            if tables.domain_taken(domain, Some(id)) {
                return Err(DatabaseError::Conflict("A property with this domain already exists".to_string()));
            }
        }

        Ok(tables.properties.iter_mut().find(|p| p.id == id).map(|property| {
            if let Some(name) = changes.name {
                property.name = name;
            }
            if let Some(domain) = changes.domain {
                property.domain = domain;
            }
            if let Some(status) = changes.status {
                property.status = status;
            }
            if let Some(tags) = changes.tags {
                property.tags = tags;
            }
            if let Some(industry) = changes.industry {
                property.industry = industry;
            }
            property.updated_at = Utc::now();
            property.clone()
        }))
    }

    async fn delete_property(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let mut tables = self.tables.lock().await;
        let before = tables.properties.len();
        tables.properties.retain(|p| p.id != id);
        tables.members.retain(|m| m.property_id != id);
        for record in tables.records.iter_mut() {
            record.property_ids.retain(|p| *p != id);
        }
        Ok(tables.properties.len() < before)
    }

    async fn list_members(&self, property_id: Uuid) -> Result<Vec<Member>, DatabaseError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .members
            .iter()
            .filter(|m| m.property_id == property_id)
            .filter_map(|m| {
                tables.users.iter().find(|u| u.id == m.user_id).map(|u| Member {
                    user_id: u.id,
                    email: u.email.clone(),
                    name: u.name.clone(),
                    joined_at: m.joined_at,
                })
            })
            .collect())
    }

    async fn add_member(&self, property_id: Uuid, user_id: Uuid) -> Result<bool, DatabaseError> {
        let mut tables = self.tables.lock().await;
        if tables
            .members
            .iter()
            .any(|m| m.property_id == property_id && m.user_id == user_id)
        {
            return Ok(false);
        }
        tables.members.push(Membership {
            property_id,
            user_id,
            joined_at: Utc::now(),
        });
        Ok(true)
    }

    async fn remove_member(&self, property_id: Uuid, user_id: Uuid) -> Result<bool, DatabaseError> {
        let mut tables = self.tables.lock().await;
        let before = tables.members.len();
        tables
            .members
            .retain(|m| !(m.property_id == property_id && m.user_id == user_id));
        Ok(tables.members.len() < before)
    }

    async fn list_records(
        &self,
        kind: EntityKind,
        actor: &Actor,
        property_id: Option<Uuid>,
    ) -> Result<Vec<LinkedRecord>, DatabaseError> {
        let tables = self.tables.lock().await;
        let memberships = tables.memberships_of(actor.user_id);
        Ok(tables
            .records
            .iter()
            .rev()
            .filter(|r| r.kind == kind)
            .filter(|r| actor.is_master || r.property_ids.iter().any(|p| memberships.contains(p)))
            .filter(|r| property_id.map_or(true, |p| r.is_linked_to(p)))
            .cloned()
            .collect())
    }

    async fn find_record(&self, kind: EntityKind, id: Uuid) -> Result<Option<LinkedRecord>, DatabaseError> {
        let tables = self.tables.lock().await;
        Ok(tables.records.iter().find(|r| r.kind == kind && r.id == id).cloned())
    }

    async fn create_record(
        &self,
        kind: EntityKind,
        values: &RecordValues,
        property_ids: &[Uuid],
    ) -> Result<LinkedRecord, DatabaseError> {
        let mut tables = self.tables.lock().await;
        if let Some(missing) = property_ids
            .iter()
            .find(|id| !tables.properties.iter().any(|p| p.id == **id))
        {
            return Err(DatabaseError::QueryError(format!("property {} does not exist", missing)));
        }

        // Unset columns come back as null, like row_to_json
        let attributes: Map<String, Value> = kind
            .columns()
            .iter()
            .map(|c| {
                let value = values.get(c.name).map(ColumnValue::to_json).unwrap_or(Value::Null);
                (c.name.to_string(), value)
            })
            .collect();

        let now = Utc::now();
        let mut linked = property_ids.to_vec();
        linked.dedup();
        let record = LinkedRecord {
            id: Uuid::new_v4(),
            kind,
            attributes,
            property_ids: linked,
            created_at: now,
            updated_at: now,
        };
        tables.records.push(record.clone());
        Ok(record)
    }

    async fn update_record(
        &self,
        kind: EntityKind,
        id: Uuid,
        values: &RecordValues,
    ) -> Result<Option<LinkedRecord>, DatabaseError> {
        let mut tables = self.tables.lock().await;
        Ok(tables.record_mut(kind, id).map(|record| {
            for (column, value) in values.iter() {
                record.attributes.insert(column.to_string(), value.to_json());
            }
            record.updated_at = Utc::now();
            record.clone()
        }))
    }

    async fn delete_record(&self, kind: EntityKind, id: Uuid) -> Result<bool, DatabaseError> {
        let mut tables = self.tables.lock().await;
        let before = tables.records.len();
        tables.records.retain(|r| !(r.kind == kind && r.id == id));
        Ok(tables.records.len() < before)
    }

    async fn link_record(&self, kind: EntityKind, id: Uuid, property_id: Uuid) -> Result<bool, DatabaseError> {
        let mut tables = self.tables.lock().await;
        let record = tables
            .record_mut(kind, id)
            .ok_or_else(|| DatabaseError::NotFound(format!("{} {}", kind.label(), id)))?;
        if record.is_linked_to(property_id) {
            return Ok(false);
        }
        record.property_ids.push(property_id);
        Ok(true)
    }

    async fn unlink_record(&self, kind: EntityKind, id: Uuid, property_id: Uuid) -> Result<bool, DatabaseError> {
        let mut tables = self.tables.lock().await;
        let Some(record) = tables.record_mut(kind, id) else {
            return Ok(false);
        };
        let before = record.property_ids.len();
        record.property_ids.retain(|p| *p != property_id);
        Ok(record.property_ids.len() < before)
    }

    async fn append_activity(&self, entry: NewActivity) -> Result<ActivityLog, DatabaseError> {
        if self.fail_activity.load(Ordering::SeqCst) {
            return Err(DatabaseError::QueryError("activity_log unavailable".to_string()));
        }

        let row = ActivityLog {
            id: Uuid::new_v4(),
            user_id: entry.user_id,
            action: entry.action,
            details: entry.details,
            ip_address: entry.ip_address,
            user_agent: entry.user_agent,
            created_at: Utc::now(),
        };
        self.tables.lock().await.activity.push(row.clone());
        Ok(row)
    }

    async fn list_activity(&self, filter: &ActivityFilter) -> Result<(Vec<ActivityLog>, i64), DatabaseError> {
        let tables = self.tables.lock().await;
        let needle = filter.action.as_ref().map(|a| a.to_lowercase());

        let matching: Vec<&ActivityLog> = tables
            .activity
            .iter()
            .rev()
            .filter(|a| filter.user_id.map_or(true, |u| a.user_id == Some(u)))
            .filter(|a| {
                needle
                    .as_ref()
                    .map_or(true, |n| a.action.to_lowercase().contains(n.as_str()))
            })
            .collect();

        let total = matching.len() as i64;
        let rows = matching
            .into_iter()
            .skip(filter.offset.max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .cloned()
            .collect();
        Ok((rows, total))
    }
}

/// The full router over a `MemoryStore`, driven with `oneshot`
pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub config: AppConfig,
    router: Router,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    pub fn data(&self) -> &Value {
        &self.body["data"]
    }

    pub fn error_code(&self) -> Option<&str> {
        self.body["error"]["code"].as_str()
    }
}

/// Socket peer every test request appears to come from
pub const TEST_PEER: ([u8; 4], u16) = ([198, 51, 100, 7], 40000);

impl TestApp {
    pub fn new() -> Self {
        Self::with_limiter(RateLimiter::disabled())
    }

    pub fn with_limiter(limiter: RateLimiter) -> Self {
        Self::with_config(AppConfig::development(), limiter)
    }

    pub fn with_config(config: AppConfig, limiter: RateLimiter) -> Self {
        let store = Arc::new(MemoryStore::new());
        let state = AppState::new(config.clone(), store.clone(), limiter);
        Self {
            store,
            config,
            router: crate::app(state),
        }
    }

    pub fn token_for(&self, user: &User) -> String {
        issue_token(user, &self.config.security).unwrap()
    }

    pub async fn request(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> TestResponse {
        self.request_with_headers(method, uri, token, body, &[]).await
    }

    pub async fn request_with_headers(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
        extra_headers: &[(&str, &str)],
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in extra_headers {
            builder = builder.header(*name, *value);
        }
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let mut request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(TEST_PEER)));

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, headers, body }
    }

    pub async fn get(&self, uri: &str, token: &str) -> TestResponse {
        self.request(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> TestResponse {
        self.request(Method::POST, uri, Some(token), Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: &str, body: Value) -> TestResponse {
        self.request(Method::PUT, uri, Some(token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> TestResponse {
        self.request(Method::DELETE, uri, Some(token), None).await
    }
}
