use async_trait::async_trait;
use serde_json::Value;
use sqlx::{Executor, PgPool, Postgres, QueryBuilder, Row};
use tracing::debug;
use uuid::Uuid;

use crate::access::Actor;
use crate::database::manager::{DatabaseError, DatabaseManager};
use crate::database::models::user::initial_standing;
use crate::database::models::{
    ActivityFilter, ActivityLog, ColumnValue, EntityKind, LinkedRecord, Member, NewActivity,
    NewProperty, NewUser, ProfileChanges, Property, PropertyChanges, RecordValues, User, UserStatus,
};
use crate::database::store::Store;

const USER_COLUMNS: &str =
    "id, email, name, password_hash, status, is_master, timezone, created_at, updated_at";
const PROPERTY_COLUMNS: &str = "id, name, domain, status, tags, industry, created_at, updated_at";
const ACTIVITY_COLUMNS: &str = "id, user_id, action, details, ip_address, user_agent, created_at";

/// PostgreSQL-backed [`Store`]
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// `SELECT row_to_json(t) ... FROM (SELECT e.*, <links> FROM <table> e`; the caller closes with `) t`
fn record_select_head(kind: EntityKind) -> String {
    format!(
        "SELECT row_to_json(t) AS row FROM (SELECT e.*, ARRAY(SELECT l.property_id FROM {link} l WHERE l.{fk} = e.id) AS property_ids FROM {table} e",
        link = kind.link_table(),
        fk = kind.link_column(),
        table = kind.table(),
    )
}

fn push_value(qb: &mut QueryBuilder<'_, Postgres>, value: &ColumnValue) {
    match value {
        ColumnValue::Text(v) => {
            qb.push_bind(v.clone());
        }
        ColumnValue::Number(v) => {
            qb.push_bind(*v);
        }
        ColumnValue::Date(v) => {
            qb.push_bind(*v);
        }
    }
}

async fn fetch_record<'e, E>(executor: E, kind: EntityKind, id: Uuid) -> Result<Option<LinkedRecord>, DatabaseError>
where
    E: Executor<'e, Database = Postgres>,
{
    let mut qb = QueryBuilder::<Postgres>::new(record_select_head(kind));
    qb.push(" WHERE e.id = ");
    qb.push_bind(id);
    qb.push(") t");

    let row = qb.build().fetch_optional(executor).await?;
    match row {
        Some(row) => {
            let value: Value = row.try_get("row")?;
            Ok(Some(LinkedRecord::from_row_json(kind, value)?))
        }
        None => Ok(None),
    }
}

fn push_activity_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &ActivityFilter) {
    qb.push(" WHERE TRUE");
    if let Some(user_id) = filter.user_id {
        qb.push(" AND user_id = ");
        qb.push_bind(user_id);
    }
    if let Some(action) = filter.action.as_ref().filter(|a| !a.is_empty()) {
        // Plain substring match: `%` and `_` in the filter are literal
        qb.push(" AND strpos(lower(action), lower(");
        qb.push_bind(action.clone());
        qb.push(")) > 0");
    }
}

#[async_trait]
impl Store for PgStore {
    async fn health_check(&self) -> Result<(), DatabaseError> {
        DatabaseManager::health_check(&self.pool).await
    }

    async fn register_user(&self, new_user: NewUser) -> Result<User, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        // Serialize registrations so exactly one caller observes an empty table
        sqlx::query("LOCK TABLE users IN SHARE ROW EXCLUSIVE MODE")
            .execute(&mut *tx)
            .await?;
        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&mut *tx)
            .await?;
        let (status, is_master) = initial_standing(existing);

        let sql = format!(
            "INSERT INTO users (id, email, name, password_hash, status, is_master, timezone)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {USER_COLUMNS}"
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(Uuid::new_v4())
            .bind(&new_user.email)
            .bind(&new_user.name)
            .bind(&new_user.password_hash)
            .bind(status.as_str())
            .bind(is_master)
            .bind(&new_user.timezone)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        debug!("Registered user {} ({:?}, master={})", user.id, status, is_master);
        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, DatabaseError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn list_users(&self) -> Result<Vec<User>, DatabaseError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at");
        let users = sqlx::query_as::<_, User>(&sql).fetch_all(&self.pool).await?;
        Ok(users)
    }

    async fn set_user_status(&self, id: Uuid, status: UserStatus) -> Result<Option<User>, DatabaseError> {
        let sql = format!(
            "UPDATE users SET status = $2, updated_at = now() WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(status.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn update_profile(&self, id: Uuid, changes: ProfileChanges) -> Result<Option<User>, DatabaseError> {
        let sql = format!(
            "UPDATE users
             SET name = COALESCE($2, name), timezone = COALESCE($3, timezone), updated_at = now()
             WHERE id = $1
             RETURNING {USER_COLUMNS}"
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(changes.name)
            .bind(changes.timezone)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn member_property_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>, DatabaseError> {
        let ids = sqlx::query_scalar::<_, Uuid>("SELECT property_id FROM property_members WHERE user_id = $1")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    async fn list_properties(&self, actor: &Actor) -> Result<Vec<Property>, DatabaseError> {
        let properties = if actor.is_master {
            let sql = format!("SELECT {PROPERTY_COLUMNS} FROM properties ORDER BY name");
            sqlx::query_as::<_, Property>(&sql).fetch_all(&self.pool).await?
        } else {
            let sql = format!(
                "SELECT {PROPERTY_COLUMNS} FROM properties
                 WHERE id IN (SELECT property_id FROM property_members WHERE user_id = $1)
                 ORDER BY name"
            );
            sqlx::query_as::<_, Property>(&sql)
                .bind(actor.user_id)
                .fetch_all(&self.pool)
                .await?
        };
        Ok(properties)
    }

    async fn find_property(&self, id: Uuid) -> Result<Option<Property>, DatabaseError> {
        let sql = format!("SELECT {PROPERTY_COLUMNS} FROM properties WHERE id = $1");
        let property = sqlx::query_as::<_, Property>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(property)
    }

    async fn create_property(&self, new_property: NewProperty, owner: Uuid) -> Result<Property, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "INSERT INTO properties (id, name, domain, status, tags, industry)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {PROPERTY_COLUMNS}"
        );
        let property = sqlx::query_as::<_, Property>(&sql)
            .bind(Uuid::new_v4())
            .bind(&new_property.name)
            .bind(&new_property.domain)
            .bind(new_property.status.as_str())
            .bind(&new_property.tags)
            .bind(&new_property.industry)
            .fetch_one(&mut *tx)
            .await?;

        sqlx::query("INSERT INTO property_members (property_id, user_id) VALUES ($1, $2)")
            .bind(property.id)
            .bind(owner)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(property)
    }

    async fn update_property(&self, id: Uuid, changes: PropertyChanges) -> Result<Option<Property>, DatabaseError> {
        let sql = format!(
            "UPDATE properties SET
                name = COALESCE($2, name),
                domain = COALESCE($3, domain),
                status = COALESCE($4, status),
                tags = COALESCE($5, tags),
                industry = CASE WHEN $6 THEN $7 ELSE industry END,
                updated_at = now()
             WHERE id = $1
             RETURNING {PROPERTY_COLUMNS}"
        );
        let clear_or_set_industry = changes.industry.is_some();
        let property = sqlx::query_as::<_, Property>(&sql)
            .bind(id)
            .bind(changes.name)
            .bind(changes.domain)
            .bind(changes.status.map(|s| s.as_str()))
            .bind(changes.tags)
            .bind(clear_or_set_industry)
            .bind(changes.industry.flatten())
            .fetch_optional(&self.pool)
            .await?;
        Ok(property)
    }

    async fn delete_property(&self, id: Uuid) -> Result<bool, DatabaseError> {
        // Memberships and record links cascade; linked records stay
        let result = sqlx::query("DELETE FROM properties WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_members(&self, property_id: Uuid) -> Result<Vec<Member>, DatabaseError> {
        let members = sqlx::query_as::<_, Member>(
            "SELECT u.id AS user_id, u.email, u.name, m.created_at AS joined_at
             FROM property_members m
             JOIN users u ON u.id = m.user_id
             WHERE m.property_id = $1
             ORDER BY m.created_at",
        )
        .bind(property_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(members)
    }

    async fn add_member(&self, property_id: Uuid, user_id: Uuid) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "INSERT INTO property_members (property_id, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(property_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn remove_member(&self, property_id: Uuid, user_id: Uuid) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM property_members WHERE property_id = $1 AND user_id = $2")
            .bind(property_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_records(
        &self,
        kind: EntityKind,
        actor: &Actor,
        property_id: Option<Uuid>,
    ) -> Result<Vec<LinkedRecord>, DatabaseError> {
        let mut qb = QueryBuilder::<Postgres>::new(record_select_head(kind));
        qb.push(" WHERE TRUE");

        if !actor.is_master {
            qb.push(format!(
                " AND EXISTS (SELECT 1 FROM {link} l JOIN property_members m ON m.property_id = l.property_id WHERE l.{fk} = e.id AND m.user_id = ",
                link = kind.link_table(),
                fk = kind.link_column(),
            ));
            qb.push_bind(actor.user_id);
            qb.push(")");
        }
        if let Some(property_id) = property_id {
            qb.push(format!(
                " AND EXISTS (SELECT 1 FROM {link} l WHERE l.{fk} = e.id AND l.property_id = ",
                link = kind.link_table(),
                fk = kind.link_column(),
            ));
            qb.push_bind(property_id);
            qb.push(")");
        }
        qb.push(") t ORDER BY t.created_at DESC");

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.into_iter()
            .map(|row| {
                let value: Value = row.try_get("row")?;
                LinkedRecord::from_row_json(kind, value)
            })
            .collect()
    }

    async fn find_record(&self, kind: EntityKind, id: Uuid) -> Result<Option<LinkedRecord>, DatabaseError> {
        fetch_record(&self.pool, kind, id).await
    }

    async fn create_record(
        &self,
        kind: EntityKind,
        values: &RecordValues,
        property_ids: &[Uuid],
    ) -> Result<LinkedRecord, DatabaseError> {
        let id = Uuid::new_v4();
        let mut tx = self.pool.begin().await?;

        let mut qb = QueryBuilder::<Postgres>::new(format!("INSERT INTO {} (id", kind.table()));
        for (column, _) in values.iter() {
            qb.push(", ");
            qb.push(*column);
        }
        qb.push(") VALUES (");
        qb.push_bind(id);
        for (_, value) in values.iter() {
            qb.push(", ");
            push_value(&mut qb, value);
        }
        qb.push(")");
        qb.build().execute(&mut *tx).await?;

        let link_sql = format!(
            "INSERT INTO {} ({}, property_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            kind.link_table(),
            kind.link_column()
        );
        for property_id in property_ids {
            sqlx::query(&link_sql)
                .bind(id)
                .bind(property_id)
                .execute(&mut *tx)
                .await?;
        }

        let record = fetch_record(&mut *tx, kind, id)
            .await?
            .ok_or_else(|| DatabaseError::QueryError(format!("{} {} vanished after insert", kind.label(), id)))?;
        tx.commit().await?;
        Ok(record)
    }

    async fn update_record(
        &self,
        kind: EntityKind,
        id: Uuid,
        values: &RecordValues,
    ) -> Result<Option<LinkedRecord>, DatabaseError> {
        if values.is_empty() {
            return fetch_record(&self.pool, kind, id).await;
        }

        let mut qb = QueryBuilder::<Postgres>::new(format!("UPDATE {} SET ", kind.table()));
        for (column, value) in values.iter() {
            qb.push(*column);
            qb.push(" = ");
            push_value(&mut qb, value);
            qb.push(", ");
        }
        qb.push("updated_at = now() WHERE id = ");
        qb.push_bind(id);

        let result = qb.build().execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }
        fetch_record(&self.pool, kind, id).await
    }

    async fn delete_record(&self, kind: EntityKind, id: Uuid) -> Result<bool, DatabaseError> {
        let sql = format!("DELETE FROM {} WHERE id = $1", kind.table());
        let result = sqlx::query(&sql).bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn link_record(&self, kind: EntityKind, id: Uuid, property_id: Uuid) -> Result<bool, DatabaseError> {
        let sql = format!(
            "INSERT INTO {} ({}, property_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            kind.link_table(),
            kind.link_column()
        );
        let result = sqlx::query(&sql)
            .bind(id)
            .bind(property_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn unlink_record(&self, kind: EntityKind, id: Uuid, property_id: Uuid) -> Result<bool, DatabaseError> {
        let sql = format!(
            "DELETE FROM {} WHERE {} = $1 AND property_id = $2",
            kind.link_table(),
            kind.link_column()
        );
        let result = sqlx::query(&sql)
            .bind(id)
            .bind(property_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn append_activity(&self, entry: NewActivity) -> Result<ActivityLog, DatabaseError> {
        let sql = format!(
            "INSERT INTO activity_logs (id, user_id, action, details, ip_address, user_agent)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {ACTIVITY_COLUMNS}"
        );
        let log = sqlx::query_as::<_, ActivityLog>(&sql)
            .bind(Uuid::new_v4())
            .bind(entry.user_id)
            .bind(&entry.action)
            .bind(&entry.details)
            .bind(&entry.ip_address)
            .bind(&entry.user_agent)
            .fetch_one(&self.pool)
            .await?;
        Ok(log)
    }

    async fn list_activity(&self, filter: &ActivityFilter) -> Result<(Vec<ActivityLog>, i64), DatabaseError> {
        let mut count_qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM activity_logs");
        push_activity_filter(&mut count_qb, filter);
        let total: i64 = count_qb.build_query_scalar().fetch_one(&self.pool).await?;

        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {ACTIVITY_COLUMNS} FROM activity_logs"));
        push_activity_filter(&mut qb, filter);
        qb.push(" ORDER BY created_at DESC LIMIT ");
        qb.push_bind(filter.limit);
        qb.push(" OFFSET ");
        qb.push_bind(filter.offset);

        let logs = qb.build_query_as::<ActivityLog>().fetch_all(&self.pool).await?;
        Ok((logs, total))
    }
}
