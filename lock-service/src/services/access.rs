//! Authorization resolver.
//!
//! One canonical check is used by every gate: a user may act on a lock when
//! they are a system admin, own the lock, hold a direct grant on it, or
//! belong to a group linked to it. Checks run in that order and stop at the
//! first match. A store error never grants access.

use crate::models::{AccessEntry, Identity, Lock};
use crate::services::error::ServiceError;
use crate::services::store::LockStore;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error};

/// Path that granted access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessGrant {
    Admin,
    Owner,
    DirectGrant,
    GroupMembership,
}

#[derive(Debug)]
pub enum AccessDecision {
    Granted(AccessGrant),
    Denied,
    /// The store failed; treated as denied.
    Failed(anyhow::Error),
}

impl AccessDecision {
    pub fn is_granted(&self) -> bool {
        matches!(self, AccessDecision::Granted(_))
    }
}

#[derive(Clone)]
pub struct AccessResolver {
    store: Arc<dyn LockStore>,
}

impl AccessResolver {
    pub fn new(store: Arc<dyn LockStore>) -> Self {
        Self { store }
    }

    pub async fn resolve(&self, identity: &Identity, lock_id: i64) -> AccessDecision {
        match self.check(identity, lock_id).await {
            Ok(Some(grant)) => {
                debug!(user_id = identity.id, lock_id, ?grant, "Access granted");
                AccessDecision::Granted(grant)
            }
            Ok(None) => AccessDecision::Denied,
            Err(err) => {
                error!(user_id = identity.id, lock_id, error = %err, "Access check failed, denying");
                AccessDecision::Failed(err)
            }
        }
    }

    pub async fn has_access(&self, identity: &Identity, lock_id: i64) -> bool {
        self.resolve(identity, lock_id).await.is_granted()
    }

    async fn check(
        &self,
        identity: &Identity,
        lock_id: i64,
    ) -> Result<Option<AccessGrant>, anyhow::Error> {
        if identity.is_admin() {
            return Ok(Some(AccessGrant::Admin));
        }
        if self.store.lock_owner(lock_id).await? == Some(identity.id) {
            return Ok(Some(AccessGrant::Owner));
        }
        if self.store.has_direct_grant(identity.id, lock_id).await? {
            return Ok(Some(AccessGrant::DirectGrant));
        }
        if self.store.shares_group_with_lock(identity.id, lock_id).await? {
            return Ok(Some(AccessGrant::GroupMembership));
        }
        Ok(None)
    }

    /// Everyone with access to the lock, one entry per user. Only the owner
    /// or an admin may ask.
    pub async fn list_users_with_access(
        &self,
        requester: &Identity,
        lock_id: i64,
    ) -> Result<Vec<AccessEntry>, ServiceError> {
        let lock = self
            .store
            .find_lock(lock_id)
            .await
            .map_err(ServiceError::Persistence)?
            .ok_or_else(|| ServiceError::lock_not_found(lock_id))?;

        require_owner_or_admin(requester, &lock)?;

        let entries = self
            .store
            .access_entries(lock_id)
            .await
            .map_err(ServiceError::Persistence)?;
        Ok(dedup_access_entries(entries))
    }
}

pub fn require_owner_or_admin(requester: &Identity, lock: &Lock) -> Result<(), ServiceError> {
    if requester.is_admin() || lock.owner_id == requester.id {
        Ok(())
    } else {
        Err(ServiceError::Denied(format!(
            "only the owner or an admin may manage lock {}",
            lock.id
        )))
    }
}

/// Collapse entries to one per user, keeping the highest role. The first
/// entry seen wins ties and keeps its position in the list.
pub fn dedup_access_entries(entries: Vec<AccessEntry>) -> Vec<AccessEntry> {
    let mut positions: HashMap<i64, usize> = HashMap::new();
    let mut unique: Vec<AccessEntry> = Vec::with_capacity(entries.len());

    for entry in entries {
        match positions.get(&entry.user_id) {
            Some(&at) => {
                if entry.role > unique[at].role {
                    unique[at] = entry;
                }
            }
            None => {
                positions.insert(entry.user_id, unique.len());
                unique.push(entry);
            }
        }
    }

    unique
}
