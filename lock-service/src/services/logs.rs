//! Audit log queries.

use crate::models::{AuditLogEntry, Identity};
use crate::services::access::require_owner_or_admin;
use crate::services::error::ServiceError;
use crate::services::store::LockStore;
use std::sync::Arc;

pub const DEFAULT_LOG_LIMIT: i64 = 500;

#[derive(Clone)]
pub struct AuditQueries {
    store: Arc<dyn LockStore>,
}

impl AuditQueries {
    pub fn new(store: Arc<dyn LockStore>) -> Self {
        Self { store }
    }

    /// Newest first. Owner or admin; admins may also read entries left by
    /// attempts against locks that no longer exist.
    pub async fn logs_for_lock(
        &self,
        requester: &Identity,
        lock_id: i64,
        limit: Option<i64>,
    ) -> Result<Vec<AuditLogEntry>, ServiceError> {
        self.authorize(requester, lock_id).await?;
        self.store
            .audit_for_lock(lock_id, limit)
            .await
            .map_err(ServiceError::Persistence)
    }

    pub async fn last_activity(
        &self,
        requester: &Identity,
        lock_id: i64,
    ) -> Result<AuditLogEntry, ServiceError> {
        self.authorize(requester, lock_id).await?;
        self.store
            .audit_for_lock(lock_id, Some(1))
            .await
            .map_err(ServiceError::Persistence)?
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::NotFound(format!("No activity recorded for lock {lock_id}")))
    }

    pub async fn all_logs(
        &self,
        requester: &Identity,
        limit: Option<i64>,
    ) -> Result<Vec<AuditLogEntry>, ServiceError> {
        if !requester.is_admin() {
            return Err(ServiceError::Denied("only admins may read the full log".to_string()));
        }
        self.store
            .all_audit(limit.unwrap_or(DEFAULT_LOG_LIMIT))
            .await
            .map_err(ServiceError::Persistence)
    }

    async fn authorize(&self, requester: &Identity, lock_id: i64) -> Result<(), ServiceError> {
        let lock = self
            .store
            .find_lock(lock_id)
            .await
            .map_err(ServiceError::Persistence)?;
        match lock {
            Some(lock) => require_owner_or_admin(requester, &lock),
            None if requester.is_admin() => Ok(()),
            None => Err(ServiceError::lock_not_found(lock_id)),
        }
    }
}
