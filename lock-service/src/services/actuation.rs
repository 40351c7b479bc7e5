//! Actuation pipeline: authorize, look up, validate, dispatch, audit.
//!
//! ```text
//! RECEIVED -> AUTHORIZING -> DENIED | LOOKUP_LOCK
//! LOOKUP_LOCK -> NOT_FOUND | UNSUPPORTED_TYPE | VALIDATING_CONFIG
//! VALIDATING_CONFIG -> CONFIG_INVALID | DISPATCHING
//! DISPATCHING -> ADAPTER_FAILED | SUCCEEDED
//! ```
//!
//! A store error while authorizing or looking up ends in PERSISTENCE_FAILED.
//! Every terminal state writes exactly one audit entry.

use crate::adapters::{AdapterConfig, Adapters, LockKind};
use crate::models::{Action, Command, Identity, Lock};
use crate::services::access::{AccessDecision, AccessResolver};
use crate::services::audit::AuditLogger;
use crate::services::error::ServiceError;
use crate::services::metrics;
use crate::services::store::LockStore;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

#[derive(Clone)]
pub struct ActuationService {
    store: Arc<dyn LockStore>,
    resolver: AccessResolver,
    adapters: Adapters,
    audit: AuditLogger,
}

impl ActuationService {
    pub fn new(
        store: Arc<dyn LockStore>,
        resolver: AccessResolver,
        adapters: Adapters,
        audit: AuditLogger,
    ) -> Self {
        Self {
            store,
            resolver,
            adapters,
            audit,
        }
    }

    pub async fn actuate(
        &self,
        identity: &Identity,
        lock_id: i64,
        command: Command,
    ) -> Result<Value, ServiceError> {
        self.execute_detached(identity, lock_id, command.into()).await
    }

    pub async fn query_status(&self, identity: &Identity, lock_id: i64) -> Result<Value, ServiceError> {
        self.execute_detached(identity, lock_id, Action::Status).await
    }

    /// Runs the pipeline on its own task so a dropped client connection
    /// cannot cut the device call or the audit write short.
    async fn execute_detached(
        &self,
        identity: &Identity,
        lock_id: i64,
        action: Action,
    ) -> Result<Value, ServiceError> {
        let service = self.clone();
        let identity = identity.clone();
        tokio::spawn(async move { service.execute(&identity, lock_id, action).await })
            .await
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("actuation task failed: {}", e)))?
    }

    #[instrument(skip(self, identity), fields(user_id = identity.id))]
    async fn execute(
        &self,
        identity: &Identity,
        lock_id: i64,
        action: Action,
    ) -> Result<Value, ServiceError> {
        let result = self.run(identity, lock_id, action).await;

        self.audit
            .record(identity.id, lock_id, action, result.is_ok())
            .await;

        let outcome = match &result {
            Ok(_) => "succeeded",
            Err(err) => err.terminal_state(),
        };
        metrics::record_actuation(action.as_str(), outcome);

        match &result {
            Ok(_) => info!(user_id = identity.id, lock_id, %action, outcome, "Actuation finished"),
            Err(err) => warn!(
                user_id = identity.id,
                lock_id,
                %action,
                outcome,
                error = %err,
                "Actuation failed"
            ),
        }

        result
    }

    async fn run(&self, identity: &Identity, lock_id: i64, action: Action) -> Result<Value, ServiceError> {
        match self.resolver.resolve(identity, lock_id).await {
            AccessDecision::Granted(grant) => debug!(lock_id, ?grant, "Authorized"),
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

        let config = adapter_config(&lock)?;
        Ok(self.adapters.execute(action, &config).await?)
    }
}

/// Resolve the lock's adapter. An unknown type is reported before its
/// configuration is looked at.
pub fn adapter_config(lock: &Lock) -> Result<AdapterConfig, ServiceError> {
    let kind = LockKind::parse(&lock.lock_type)
        .ok_or_else(|| ServiceError::UnsupportedType(lock.lock_type.clone()))?;
    Ok(AdapterConfig::parse(kind, &lock.adapter_data)?)
}
