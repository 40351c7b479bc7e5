//! Persistence seam.
//!
//! [`PgStore`](super::database::PgStore) is the production implementation;
//! [`InMemoryStore`](super::memory::InMemoryStore) backs tests and local runs.

use crate::models::{
    AccessEntry, AccessGroup, AccessRole, AuditLogEntry, DirectGrant, GroupMember, GroupSummary,
    Lock, NewAuditEntry, NewLock,
};
use async_trait::async_trait;
use serde_json::Value;

#[async_trait]
pub trait LockStore: Send + Sync {
    async fn health_check(&self) -> Result<(), anyhow::Error>;

    async fn user_exists(&self, user_id: i64) -> Result<bool, anyhow::Error>;

    // Locks

    async fn insert_lock(&self, lock: NewLock) -> Result<Lock, anyhow::Error>;
    async fn find_lock(&self, lock_id: i64) -> Result<Option<Lock>, anyhow::Error>;
    async fn lock_owner(&self, lock_id: i64) -> Result<Option<i64>, anyhow::Error>;
    async fn list_all_locks(&self) -> Result<Vec<Lock>, anyhow::Error>;
    /// Locks the user owns, is granted, or reaches through a group, by id.
    async fn list_accessible_locks(&self, user_id: i64) -> Result<Vec<Lock>, anyhow::Error>;
    /// Returns `false` when the lock does not exist.
    async fn update_adapter_data(&self, lock_id: i64, adapter_data: Value)
        -> Result<bool, anyhow::Error>;

    // Access relations

    async fn has_direct_grant(&self, user_id: i64, lock_id: i64) -> Result<bool, anyhow::Error>;
    /// Whether the user belongs to any group linked to the lock.
    async fn shares_group_with_lock(&self, user_id: i64, lock_id: i64)
        -> Result<bool, anyhow::Error>;
    /// Raw access rows for a lock: the owner, then direct grants, then group
    /// members. A user may appear more than once.
    async fn access_entries(&self, lock_id: i64) -> Result<Vec<AccessEntry>, anyhow::Error>;
    /// Insert or replace the grant's role.
    async fn grant_access(&self, grant: &DirectGrant) -> Result<(), anyhow::Error>;

    // Groups

    /// Create a group with `owner_id` as its `owner` member.
    async fn create_group(&self, name: &str, owner_id: i64) -> Result<AccessGroup, anyhow::Error>;
    async fn find_group(&self, group_id: i64) -> Result<Option<AccessGroup>, anyhow::Error>;
    async fn group_role(&self, group_id: i64, user_id: i64)
        -> Result<Option<AccessRole>, anyhow::Error>;
    /// Insert or replace the member's role.
    async fn add_group_member(
        &self,
        group_id: i64,
        user_id: i64,
        role: AccessRole,
    ) -> Result<(), anyhow::Error>;
    /// Idempotent.
    async fn link_group_lock(&self, group_id: i64, lock_id: i64) -> Result<(), anyhow::Error>;
    async fn list_group_members(&self, group_id: i64) -> Result<Vec<GroupMember>, anyhow::Error>;
    async fn list_groups_for_user(&self, user_id: i64) -> Result<Vec<GroupSummary>, anyhow::Error>;

    // Audit log

    async fn append_audit(&self, entry: &NewAuditEntry) -> Result<i64, anyhow::Error>;
    /// Newest first.
    async fn audit_for_lock(
        &self,
        lock_id: i64,
        limit: Option<i64>,
    ) -> Result<Vec<AuditLogEntry>, anyhow::Error>;
    /// Newest first, across all locks.
    async fn all_audit(&self, limit: i64) -> Result<Vec<AuditLogEntry>, anyhow::Error>;

    async fn close(&self);
}
