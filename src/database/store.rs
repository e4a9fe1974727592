use async_trait::async_trait;
use uuid::Uuid;

use crate::access::Actor;
use crate::database::manager::DatabaseError;
use crate::database::models::{
    ActivityFilter, ActivityLog, EntityKind, LinkedRecord, Member, NewActivity, NewProperty,
    NewUser, ProfileChanges, Property, PropertyChanges, RecordValues, User, UserStatus,
};

/// Persistence seam used by handlers, access checks and the audit logger.
///
/// Reads that take an [`Actor`] are scoped: a non-master actor only sees rows
/// linked to a property they are a member of. Reads and writes by id are
/// unscoped; callers authorize through [`crate::access`] first.
#[async_trait]
pub trait Store: Send + Sync {
    async fn health_check(&self) -> Result<(), DatabaseError>;

    // Users

    /// Insert a user. The first user ever stored becomes an active master,
    /// everyone after is pending approval.
    async fn register_user(&self, new_user: NewUser) -> Result<User, DatabaseError>;
    async fn find_user(&self, id: Uuid) -> Result<Option<User>, DatabaseError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError>;
    async fn list_users(&self) -> Result<Vec<User>, DatabaseError>;
    async fn set_user_status(&self, id: Uuid, status: UserStatus) -> Result<Option<User>, DatabaseError>;
    async fn update_profile(&self, id: Uuid, changes: ProfileChanges) -> Result<Option<User>, DatabaseError>;
    async fn delete_user(&self, id: Uuid) -> Result<bool, DatabaseError>;

    // Properties and membership

    async fn member_property_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>, DatabaseError>;
    async fn list_properties(&self, actor: &Actor) -> Result<Vec<Property>, DatabaseError>;
    async fn find_property(&self, id: Uuid) -> Result<Option<Property>, DatabaseError>;
    /// Create the property and make `owner` its first member
    async fn create_property(&self, new_property: NewProperty, owner: Uuid) -> Result<Property, DatabaseError>;
    async fn update_property(&self, id: Uuid, changes: PropertyChanges) -> Result<Option<Property>, DatabaseError>;
    async fn delete_property(&self, id: Uuid) -> Result<bool, DatabaseError>;
    async fn list_members(&self, property_id: Uuid) -> Result<Vec<Member>, DatabaseError>;
    /// Returns false when the user already was a member
    async fn add_member(&self, property_id: Uuid, user_id: Uuid) -> Result<bool, DatabaseError>;
    async fn remove_member(&self, property_id: Uuid, user_id: Uuid) -> Result<bool, DatabaseError>;

    // Linked records (campaigns, affiliates, ad networks, advertisers)

    async fn list_records(
        &self,
        kind: EntityKind,
        actor: &Actor,
        property_id: Option<Uuid>,
    ) -> Result<Vec<LinkedRecord>, DatabaseError>;
    async fn find_record(&self, kind: EntityKind, id: Uuid) -> Result<Option<LinkedRecord>, DatabaseError>;
    /// Insert the record and its property links atomically
    async fn create_record(
        &self,
        kind: EntityKind,
        values: &RecordValues,
        property_ids: &[Uuid],
    ) -> Result<LinkedRecord, DatabaseError>;
    async fn update_record(
        &self,
        kind: EntityKind,
        id: Uuid,
        values: &RecordValues,
    ) -> Result<Option<LinkedRecord>, DatabaseError>;
    async fn delete_record(&self, kind: EntityKind, id: Uuid) -> Result<bool, DatabaseError>;
    /// Returns false when the link already existed
    async fn link_record(&self, kind: EntityKind, id: Uuid, property_id: Uuid) -> Result<bool, DatabaseError>;
    /// Removes only the relation; the record itself is kept
    async fn unlink_record(&self, kind: EntityKind, id: Uuid, property_id: Uuid) -> Result<bool, DatabaseError>;

    // Activity log (append-only)

    async fn append_activity(&self, entry: NewActivity) -> Result<ActivityLog, DatabaseError>;
    /// Matching rows newest first, plus the total match count
    async fn list_activity(&self, filter: &ActivityFilter) -> Result<(Vec<ActivityLog>, i64), DatabaseError>;
}
