use crate::models::{Action, NewAuditEntry};
use crate::services::metrics;
use crate::services::store::LockStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Appends one audit row per actuation attempt.
#[derive(Clone)]
pub struct AuditLogger {
    store: Arc<dyn LockStore>,
    wait: Duration,
}

impl AuditLogger {
    /// `wait` bounds how long [`record`](Self::record) blocks the caller.
    pub fn new(store: Arc<dyn LockStore>, wait: Duration) -> Self {
        Self { store, wait }
    }

    /// Write the entry on a spawned task and wait for it at most `wait`.
    /// Failures are logged and counted; they never reach the caller.
    pub async fn record(&self, user_id: i64, lock_id: i64, action: Action, success: bool) {
        let entry = NewAuditEntry::new(user_id, lock_id, action, success);
        let store = self.store.clone();

        let write = tokio::spawn(async move {
            match store.append_audit(&entry).await {
                Ok(id) => debug!(audit_id = id, user_id, lock_id, %action, success, "Audit entry written"),
                Err(e) => {
                    metrics::record_audit_write_failure();
                    error!(
                        error = %e,
                        user_id,
                        lock_id,
                        %action,
                        success,
                        "Failed to write audit entry"
                    );
                }
            }
        });

        match tokio::time::timeout(self.wait, write).await {
            Ok(Ok(())) => {}
            Ok(Err(join_err)) => {
                metrics::record_audit_write_failure();
                error!(error = %join_err, user_id, lock_id, %action, "Audit write task failed");
            }
            Err(_) => warn!(
                user_id,
                lock_id,
                %action,
                wait_ms = self.wait.as_millis() as u64,
                "Audit write still pending, continuing without it"
            ),
        }
    }
}
