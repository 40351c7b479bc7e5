//! Lock catalogue: create, read, list and reconfigure locks.
//!
//! Live status fetched here is informational; it is not an actuation attempt
//! and is not audited.

use crate::adapters::{AdapterConfig, Adapters, LockKind};
use crate::models::{Action, Identity, Lock, LockSummary, NewLock};
use crate::services::access::{require_owner_or_admin, AccessDecision, AccessResolver};
use crate::services::actuation::adapter_config;
use crate::services::error::ServiceError;
use crate::services::store::LockStore;
use futures::stream::{self, StreamExt};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Status placeholders shown when a live status could not be read.
pub const STATUS_UNKNOWN: &str = "unknown";
pub const STATUS_INVALID_ADAPTER: &str = "invalid-adapter";
pub const STATUS_MISSING_DATA: &str = "missing-data";

/// Live status reads in flight at once when listing locks.
pub const LIVE_STATUS_CONCURRENCY: usize = 8;

#[derive(Debug, Clone)]
pub struct CreateLock {
    pub name: String,
    pub lock_type: String,
    pub adapter_data: Value,
    pub owner_name: Option<String>,
    pub floor: Option<String>,
    pub room: Option<String>,
    pub address: Option<String>,
}

#[derive(Clone)]
pub struct LockCatalogue {
    store: Arc<dyn LockStore>,
    resolver: AccessResolver,
    adapters: Adapters,
}

impl LockCatalogue {
    pub fn new(store: Arc<dyn LockStore>, resolver: AccessResolver, adapters: Adapters) -> Self {
        Self {
            store,
            resolver,
            adapters,
        }
    }

    /// Register a lock owned by the requester. The type and configuration
    /// are validated the same way actuation validates them.
    #[instrument(skip(self, input), fields(user_id = owner.id, lock_type = %input.lock_type))]
    pub async fn create_lock(&self, owner: &Identity, input: CreateLock) -> Result<Lock, ServiceError> {
        let kind = LockKind::parse(&input.lock_type)
            .ok_or_else(|| ServiceError::UnsupportedType(input.lock_type.clone()))?;
        AdapterConfig::parse(kind, &input.adapter_data)?;

        let lock = self
            .store
            .insert_lock(NewLock {
                owner_id: owner.id,
                name: input.name,
                lock_type: kind.as_str().to_string(),
                adapter_data: input.adapter_data,
                owner_name: input.owner_name,
                floor: input.floor,
                room: input.room,
                address: input.address,
            })
            .await
            .map_err(ServiceError::Persistence)?;

        info!(lock_id = lock.id, "Lock registered");
        Ok(lock)
    }

    /// Locks the user can act on. Admins see every lock.
    pub async fn list_accessible_locks(
        &self,
        identity: &Identity,
        with_status: bool,
    ) -> Result<Vec<LockSummary>, ServiceError> {
        let locks = if identity.is_admin() {
            self.store.list_all_locks().await
        } else {
            self.store.list_accessible_locks(identity.id).await
        }
        .map_err(ServiceError::Persistence)?;

        if !with_status {
            return Ok(locks.iter().map(LockSummary::from).collect());
        }

        let pending: Vec<_> = locks
            .iter()
            .map(|lock| async move {
                let mut summary = LockSummary::from(lock);
                summary.status = Some(self.live_status(lock).await);
                summary
            })
            .collect();
        let summaries = stream::iter(pending)
            .buffered(LIVE_STATUS_CONCURRENCY)
            .collect::<Vec<_>>()
            .await;
        Ok(summaries)
    }

    /// One lock with its live status. Requires access.
    pub async fn get_lock(&self, identity: &Identity, lock_id: i64) -> Result<LockSummary, ServiceError> {
        match self.resolver.resolve(identity, lock_id).await {
            AccessDecision::Granted(_) => {}
            AccessDecision::Denied => {
                return Err(ServiceError::Denied(format!("no access to lock {lock_id}")));
            }
            AccessDecision::Failed(err) => return Err(ServiceError::Persistence(err)),
        }

        let lock = self
            .store
            .find_lock(lock_id)
            .await
            .map_err(ServiceError::Persistence)?
            .ok_or_else(|| ServiceError::lock_not_found(lock_id))?;

        let mut summary = LockSummary::from(&lock);
        summary.status = Some(self.live_status(&lock).await);
        Ok(summary)
    }

    /// Replace a lock's adapter configuration. Owner or admin only.
    #[instrument(skip(self, adapter_data), fields(user_id = identity.id))]
    pub async fn update_adapter_config(
        &self,
        identity: &Identity,
        lock_id: i64,
        adapter_data: Value,
    ) -> Result<LockSummary, ServiceError> {
        let lock = self
            .store
            .find_lock(lock_id)
            .await
            .map_err(ServiceError::Persistence)?
            .ok_or_else(|| ServiceError::lock_not_found(lock_id))?;

        require_owner_or_admin(identity, &lock)?;

        let kind = LockKind::parse(&lock.lock_type)
            .ok_or_else(|| ServiceError::UnsupportedType(lock.lock_type.clone()))?;
        AdapterConfig::parse(kind, &adapter_data)?;

        let updated = self
            .store
            .update_adapter_data(lock_id, adapter_data)
            .await
            .map_err(ServiceError::Persistence)?;
        if !updated {
            return Err(ServiceError::lock_not_found(lock_id));
        }

        info!(lock_id, "Adapter configuration updated");
        Ok(LockSummary::from(&lock))
    }

    async fn live_status(&self, lock: &Lock) -> Value {
        let config = match adapter_config(lock) {
            Ok(config) => config,
            Err(ServiceError::UnsupportedType(_)) => return json!(STATUS_INVALID_ADAPTER),
            Err(_) => return json!(STATUS_MISSING_DATA),
        };

        match self.adapters.execute(Action::Status, &config).await {
            Ok(status) => status,
            Err(err) => {
                warn!(lock_id = lock.id, error = %err, "Could not read lock status");
                json!(STATUS_UNKNOWN)
            }
        }
    }
}
