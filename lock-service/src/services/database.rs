//! Postgres implementation of [`LockStore`].

use crate::models::{
    AccessEntry, AccessGroup, AccessRole, AccessSource, Action, AuditLogEntry, DirectGrant,
    GroupMember, GroupSummary, Lock, NewAuditEntry, NewLock,
};
use crate::services::metrics::db_timer;
use crate::services::store::LockStore;
use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use std::time::Duration;
use tracing::{info, instrument};

const LOCK_COLUMNS: &str = "l.id, l.name, l.lock_type, l.adapter_data, l.owner_id, l.owner_name, \
                            l.floor, l.room, l.address, l.created_at";

const AUDIT_SELECT: &str = r#"
    SELECT a.id, a.user_id, a.lock_id, a.action, a.success, a.timestamp,
           COALESCE(NULLIF(TRIM(CONCAT_WS(' ', u.first_name, u.last_name)), ''), u.email) AS username,
           l.name AS lock_name
    FROM access_logs a
    LEFT JOIN users u ON u.id = a.user_id
    LEFT JOIN locks l ON l.id = a.lock_id
"#;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

#[derive(FromRow)]
struct AccessRow {
    user_id: i64,
    email: Option<String>,
    role: String,
    source: String,
}

impl From<AccessRow> for AccessEntry {
    fn from(row: AccessRow) -> Self {
        let source = match row.source.as_str() {
            "owner" => AccessSource::Owner,
            "direct_grant" => AccessSource::DirectGrant,
            _ => AccessSource::Group,
        };
        AccessEntry {
            user_id: row.user_id,
            email: row.email,
            role: AccessRole::parse(&row.role),
            source,
        }
    }
}

#[derive(FromRow)]
struct AuditRow {
    id: i64,
    user_id: i64,
    lock_id: i64,
    action: String,
    success: bool,
    timestamp: DateTime<Utc>,
    username: Option<String>,
    lock_name: Option<String>,
}

impl TryFrom<AuditRow> for AuditLogEntry {
    type Error = anyhow::Error;

    fn try_from(row: AuditRow) -> Result<Self, Self::Error> {
        let action = Action::parse(&row.action)
            .ok_or_else(|| anyhow!("Unknown action '{}' in audit row {}", row.action, row.id))?;
        Ok(AuditLogEntry {
            id: row.id,
            user_id: row.user_id,
            lock_id: row.lock_id,
            action,
            success: row.success,
            timestamp: row.timestamp,
            username: row.username,
            lock_name: row.lock_name,
        })
    }
}

#[derive(FromRow)]
struct MemberRow {
    user_id: i64,
    email: Option<String>,
    role: String,
}

#[derive(FromRow)]
struct GroupSummaryRow {
    id: i64,
    name: String,
    role: String,
    user_count: i64,
    lock_count: i64,
}

impl PgStore {
    #[instrument(skip(database_url))]
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, anyhow::Error> {
        info!(max_connections, "Connecting to PostgreSQL");

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| anyhow!("Failed to connect: {}", e))?;

        info!("PostgreSQL connection pool established");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), anyhow::Error> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| anyhow!("Migration failed: {}", e))?;
        info!("Database migrations completed");
        Ok(())
    }

    async fn fetch_audit(
        &self,
        filter: &str,
        lock_id: Option<i64>,
        limit: Option<i64>,
    ) -> Result<Vec<AuditLogEntry>, anyhow::Error> {
        let sql = format!(
            "{AUDIT_SELECT} {filter} ORDER BY a.timestamp DESC, a.id DESC LIMIT $2"
        );
        let rows = sqlx::query_as::<_, AuditRow>(&sql)
            .bind(lock_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| anyhow!("Failed to read audit log: {}", e))?;
        rows.into_iter().map(AuditLogEntry::try_from).collect()
    }
}

#[async_trait]
impl LockStore for PgStore {
    async fn health_check(&self) -> Result<(), anyhow::Error> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| anyhow!("Health check failed: {}", e))?;
        Ok(())
    }

    async fn user_exists(&self, user_id: i64) -> Result<bool, anyhow::Error> {
        let _timer = db_timer("user_exists");
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| anyhow!("Failed to look up user: {}", e))?;
        Ok(exists)
    }

    #[instrument(skip(self, lock), fields(owner_id = lock.owner_id, lock_type = %lock.lock_type))]
    async fn insert_lock(&self, lock: NewLock) -> Result<Lock, anyhow::Error> {
        let _timer = db_timer("insert_lock");
        let sql = format!(
            r#"
            INSERT INTO locks AS l (name, lock_type, adapter_data, owner_id, owner_name, floor, room, address)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {LOCK_COLUMNS}
            "#
        );
        let created = sqlx::query_as::<_, Lock>(&sql)
            .bind(&lock.name)
            .bind(&lock.lock_type)
            .bind(&lock.adapter_data)
            .bind(lock.owner_id)
            .bind(&lock.owner_name)
            .bind(&lock.floor)
            .bind(&lock.room)
            .bind(&lock.address)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| anyhow!("Failed to create lock: {}", e))?;

        info!(lock_id = created.id, "Lock created");
        Ok(created)
    }

    async fn find_lock(&self, lock_id: i64) -> Result<Option<Lock>, anyhow::Error> {
        let _timer = db_timer("find_lock");
        let sql = format!("SELECT {LOCK_COLUMNS} FROM locks l WHERE l.id = $1");
        sqlx::query_as::<_, Lock>(&sql)
            .bind(lock_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| anyhow!("Failed to find lock: {}", e))
    }

    async fn lock_owner(&self, lock_id: i64) -> Result<Option<i64>, anyhow::Error> {
        let _timer = db_timer("lock_owner");
        sqlx::query_scalar("SELECT owner_id FROM locks WHERE id = $1")
            .bind(lock_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| anyhow!("Failed to read lock owner: {}", e))
    }

    async fn list_all_locks(&self) -> Result<Vec<Lock>, anyhow::Error> {
        let _timer = db_timer("list_all_locks");
        let sql = format!("SELECT {LOCK_COLUMNS} FROM locks l ORDER BY l.id");
        sqlx::query_as::<_, Lock>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| anyhow!("Failed to list locks: {}", e))
    }

    async fn list_accessible_locks(&self, user_id: i64) -> Result<Vec<Lock>, anyhow::Error> {
        let _timer = db_timer("list_accessible_locks");
        let sql = format!(
            r#"
            SELECT {LOCK_COLUMNS}
            FROM locks l
            WHERE l.owner_id = $1
               OR EXISTS (SELECT 1 FROM user_locks ul WHERE ul.lock_id = l.id AND ul.user_id = $1)
               OR EXISTS (
                    SELECT 1
                    FROM access_group_locks agl
                    JOIN access_group_users agu ON agu.group_id = agl.group_id
                    WHERE agl.lock_id = l.id AND agu.user_id = $1
               )
            ORDER BY l.id
            "#
        );
        sqlx::query_as::<_, Lock>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| anyhow!("Failed to list accessible locks: {}", e))
    }

    async fn update_adapter_data(
        &self,
        lock_id: i64,
        adapter_data: Value,
    ) -> Result<bool, anyhow::Error> {
        let _timer = db_timer("update_adapter_data");
        let result = sqlx::query("UPDATE locks SET adapter_data = $2 WHERE id = $1")
            .bind(lock_id)
            .bind(&adapter_data)
            .execute(&self.pool)
            .await
            .map_err(|e| anyhow!("Failed to update adapter data: {}", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn has_direct_grant(&self, user_id: i64, lock_id: i64) -> Result<bool, anyhow::Error> {
        let _timer = db_timer("has_direct_grant");
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM user_locks WHERE user_id = $1 AND lock_id = $2)",
        )
        .bind(user_id)
        .bind(lock_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| anyhow!("Failed to check direct grant: {}", e))?;
        Ok(exists)
    }

    async fn shares_group_with_lock(
        &self,
        user_id: i64,
        lock_id: i64,
    ) -> Result<bool, anyhow::Error> {
        let _timer = db_timer("shares_group_with_lock");
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM access_group_users agu
                JOIN access_group_locks agl ON agl.group_id = agu.group_id
                WHERE agu.user_id = $1 AND agl.lock_id = $2
            )
            "#,
        )
        .bind(user_id)
        .bind(lock_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| anyhow!("Failed to check group access: {}", e))?;
        Ok(exists)
    }

    async fn access_entries(&self, lock_id: i64) -> Result<Vec<AccessEntry>, anyhow::Error> {
        let _timer = db_timer("access_entries");
        let rows = sqlx::query_as::<_, AccessRow>(
            r#"
            SELECT user_id, email, role, source FROM (
                SELECT l.owner_id AS user_id, u.email, 'owner'::text AS role,
                       'owner'::text AS source, 0 AS ord
                FROM locks l
                LEFT JOIN users u ON u.id = l.owner_id
                WHERE l.id = $1
                UNION ALL
                SELECT ul.user_id, u.email, ul.role, 'direct_grant'::text, 1
                FROM user_locks ul
                LEFT JOIN users u ON u.id = ul.user_id
                WHERE ul.lock_id = $1
                UNION ALL
                SELECT agu.user_id, u.email, agu.role, 'group'::text, 2
                FROM access_group_locks agl
                JOIN access_group_users agu ON agu.group_id = agl.group_id
                LEFT JOIN users u ON u.id = agu.user_id
                WHERE agl.lock_id = $1
            ) entries
            ORDER BY ord, user_id
            "#,
        )
        .bind(lock_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| anyhow!("Failed to list lock access: {}", e))?;
        Ok(rows.into_iter().map(AccessEntry::from).collect())
    }

    #[instrument(skip(self))]
    async fn grant_access(&self, grant: &DirectGrant) -> Result<(), anyhow::Error> {
        let _timer = db_timer("grant_access");
        sqlx::query(
            r#"
            INSERT INTO user_locks (user_id, lock_id, role)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, lock_id) DO UPDATE SET role = EXCLUDED.role
            "#,
        )
        .bind(grant.user_id)
        .bind(grant.lock_id)
        .bind(grant.role.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| anyhow!("Failed to grant access: {}", e))?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn create_group(&self, name: &str, owner_id: i64) -> Result<AccessGroup, anyhow::Error> {
        let _timer = db_timer("create_group");
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| anyhow!("Failed to begin transaction: {}", e))?;

        let group = sqlx::query_as::<_, AccessGroup>(
            "INSERT INTO access_groups (name) VALUES ($1) RETURNING id, name, created_at",
        )
        .bind(name)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| anyhow!("Failed to create group: {}", e))?;

        sqlx::query("INSERT INTO access_group_users (group_id, user_id, role) VALUES ($1, $2, $3)")
            .bind(group.id)
            .bind(owner_id)
            .bind(AccessRole::Owner.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| anyhow!("Failed to add group owner: {}", e))?;

        tx.commit()
            .await
            .map_err(|e| anyhow!("Failed to commit group: {}", e))?;

        info!(group_id = group.id, "Access group created");
        Ok(group)
    }

    async fn find_group(&self, group_id: i64) -> Result<Option<AccessGroup>, anyhow::Error> {
        let _timer = db_timer("find_group");
        sqlx::query_as::<_, AccessGroup>(
            "SELECT id, name, created_at FROM access_groups WHERE id = $1",
        )
        .bind(group_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| anyhow!("Failed to find group: {}", e))
    }

    async fn group_role(
        &self,
        group_id: i64,
        user_id: i64,
    ) -> Result<Option<AccessRole>, anyhow::Error> {
        let _timer = db_timer("group_role");
        let role: Option<String> = sqlx::query_scalar(
            "SELECT role FROM access_group_users WHERE group_id = $1 AND user_id = $2",
        )
        .bind(group_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| anyhow!("Failed to read group role: {}", e))?;
        Ok(role.as_deref().map(AccessRole::parse))
    }

    async fn add_group_member(
        &self,
        group_id: i64,
        user_id: i64,
        role: AccessRole,
    ) -> Result<(), anyhow::Error> {
        let _timer = db_timer("add_group_member");
        sqlx::query(
            r#"
            INSERT INTO access_group_users (group_id, user_id, role)
            VALUES ($1, $2, $3)
            ON CONFLICT (group_id, user_id) DO UPDATE SET role = EXCLUDED.role
            "#,
        )
        .bind(group_id)
        .bind(user_id)
        .bind(role.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| anyhow!("Failed to add group member: {}", e))?;
        Ok(())
    }

    async fn link_group_lock(&self, group_id: i64, lock_id: i64) -> Result<(), anyhow::Error> {
        let _timer = db_timer("link_group_lock");
        sqlx::query(
            r#"
            INSERT INTO access_group_locks (group_id, lock_id)
            VALUES ($1, $2)
            ON CONFLICT (group_id, lock_id) DO NOTHING
            "#,
        )
        .bind(group_id)
        .bind(lock_id)
        .execute(&self.pool)
        .await
        .map_err(|e| anyhow!("Failed to link lock to group: {}", e))?;
        Ok(())
    }

    async fn list_group_members(&self, group_id: i64) -> Result<Vec<GroupMember>, anyhow::Error> {
        let _timer = db_timer("list_group_members");
        let rows = sqlx::query_as::<_, MemberRow>(
            r#"
            SELECT agu.user_id, u.email, agu.role
            FROM access_group_users agu
            LEFT JOIN users u ON u.id = agu.user_id
            WHERE agu.group_id = $1
            ORDER BY agu.user_id
            "#,
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| anyhow!("Failed to list group members: {}", e))?;

        Ok(rows
            .into_iter()
            .map(|row| GroupMember {
                user_id: row.user_id,
                email: row.email,
                role: AccessRole::parse(&row.role),
            })
            .collect())
    }

    async fn list_groups_for_user(&self, user_id: i64) -> Result<Vec<GroupSummary>, anyhow::Error> {
        let _timer = db_timer("list_groups_for_user");
        let rows = sqlx::query_as::<_, GroupSummaryRow>(
            r#"
            SELECT g.id, g.name, agu.role,
                   (SELECT COUNT(*) FROM access_group_users m WHERE m.group_id = g.id) AS user_count,
                   (SELECT COUNT(*) FROM access_group_locks k WHERE k.group_id = g.id) AS lock_count
            FROM access_groups g
            JOIN access_group_users agu ON agu.group_id = g.id
            WHERE agu.user_id = $1
            ORDER BY g.name, g.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| anyhow!("Failed to list groups: {}", e))?;

        Ok(rows
            .into_iter()
            .map(|row| GroupSummary {
                id: row.id,
                name: row.name,
                role: AccessRole::parse(&row.role),
                user_count: row.user_count,
                lock_count: row.lock_count,
            })
            .collect())
    }

    async fn append_audit(&self, entry: &NewAuditEntry) -> Result<i64, anyhow::Error> {
        let _timer = db_timer("append_audit");
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO access_logs (user_id, lock_id, action, success, timestamp)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(entry.user_id)
        .bind(entry.lock_id)
        .bind(entry.action.as_str())
        .bind(entry.success)
        .bind(entry.timestamp)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| anyhow!("Failed to append audit entry: {}", e))?;
        Ok(id)
    }

    async fn audit_for_lock(
        &self,
        lock_id: i64,
        limit: Option<i64>,
    ) -> Result<Vec<AuditLogEntry>, anyhow::Error> {
        let _timer = db_timer("audit_for_lock");
        self.fetch_audit("WHERE a.lock_id = $1", Some(lock_id), limit)
            .await
    }

    async fn all_audit(&self, limit: i64) -> Result<Vec<AuditLogEntry>, anyhow::Error> {
        let _timer = db_timer("all_audit");
        self.fetch_audit("WHERE ($1::bigint IS NULL OR a.lock_id = $1)", None, Some(limit))
            .await
    }

    async fn close(&self) {
        info!("Closing PostgreSQL pool");
        self.pool.close().await;
    }
}
