#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use lock_service::adapters::{avior::AviorAdapter, raspberry::RaspberryAdapter, retry::RetryPolicy, Adapters};
use lock_service::models::{
    AccessEntry, AccessGroup, AccessRole, AuditLogEntry, DirectGrant, GroupMember, GroupSummary,
    Lock, NewAuditEntry, NewLock, User,
};
use lock_service::services::{InMemoryStore, JwtAuthenticator, LockStore, TokenClaims};
use lock_service::{build_router, AppState};
use secrecy::Secret;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wiremock::MockServer;

pub const JWT_SECRET: &str = "test-jwt-secret";
pub const PI_API_KEY: &str = "test-pi-api-key";

pub const OWNER_ID: i64 = 1;
pub const MEMBER_ID: i64 = 2;
pub const STRANGER_ID: i64 = 3;
pub const ADMIN_ID: i64 = 9;

/// Device policy with the production shape (one retry) but short waits.
pub fn fast_device_policy() -> RetryPolicy {
    RetryPolicy::device_local()
        .with_retry_delay(Duration::from_millis(50))
        .with_attempt_timeout(Duration::from_millis(300))
}

pub fn user(id: i64, role: &str) -> User {
    User {
        id,
        email: format!("user{id}@example.com"),
        first_name: None,
        last_name: None,
        role: role.to_string(),
    }
}

pub fn token_for(id: i64, role: &str) -> String {
    let claims = TokenClaims {
        id,
        email: Some(format!("user{id}@example.com")),
        role: Some(role.to_string()),
        exp: (Utc::now() + chrono::Duration::hours(1)).timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("Failed to sign test token")
}

/// In-memory store with switchable failures and an audit attempt counter.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: InMemoryStore,
    pub fail_lookups: AtomicBool,
    pub fail_audit: AtomicBool,
    pub audit_attempts: AtomicUsize,
}

impl FlakyStore {
    fn lookup_guard(&self) -> Result<(), anyhow::Error> {
        if self.fail_lookups.load(Ordering::SeqCst) {
            anyhow::bail!("connection refused");
        }
        Ok(())
    }

    pub fn audit_entries(&self) -> Vec<AuditLogEntry> {
        self.inner.audit_entries().expect("store poisoned")
    }
}

#[async_trait]
impl LockStore for FlakyStore {
    async fn health_check(&self) -> Result<(), anyhow::Error> {
        self.lookup_guard()?;
        self.inner.health_check().await
    }

    async fn user_exists(&self, user_id: i64) -> Result<bool, anyhow::Error> {
        self.lookup_guard()?;
        self.inner.user_exists(user_id).await
    }

    async fn insert_lock(&self, lock: NewLock) -> Result<Lock, anyhow::Error> {
        self.inner.insert_lock(lock).await
    }

    async fn find_lock(&self, lock_id: i64) -> Result<Option<Lock>, anyhow::Error> {
        self.lookup_guard()?;
        self.inner.find_lock(lock_id).await
    }

    async fn lock_owner(&self, lock_id: i64) -> Result<Option<i64>, anyhow::Error> {
        self.lookup_guard()?;
        self.inner.lock_owner(lock_id).await
    }

    async fn list_all_locks(&self) -> Result<Vec<Lock>, anyhow::Error> {
        self.lookup_guard()?;
        self.inner.list_all_locks().await
    }

    async fn list_accessible_locks(&self, user_id: i64) -> Result<Vec<Lock>, anyhow::Error> {
        self.lookup_guard()?;
        self.inner.list_accessible_locks(user_id).await
    }

    async fn update_adapter_data(
        &self,
        lock_id: i64,
        adapter_data: Value,
    ) -> Result<bool, anyhow::Error> {
        self.inner.update_adapter_data(lock_id, adapter_data).await
    }

    async fn has_direct_grant(&self, user_id: i64, lock_id: i64) -> Result<bool, anyhow::Error> {
        self.lookup_guard()?;
        self.inner.has_direct_grant(user_id, lock_id).await
    }

    async fn shares_group_with_lock(
        &self,
        user_id: i64,
        lock_id: i64,
    ) -> Result<bool, anyhow::Error> {
        self.lookup_guard()?;
        self.inner.shares_group_with_lock(user_id, lock_id).await
    }

    async fn access_entries(&self, lock_id: i64) -> Result<Vec<AccessEntry>, anyhow::Error> {
        self.lookup_guard()?;
        self.inner.access_entries(lock_id).await
    }

    async fn grant_access(&self, grant: &DirectGrant) -> Result<(), anyhow::Error> {
        self.inner.grant_access(grant).await
    }

    async fn create_group(&self, name: &str, owner_id: i64) -> Result<AccessGroup, anyhow::Error> {
        self.inner.create_group(name, owner_id).await
    }

    async fn find_group(&self, group_id: i64) -> Result<Option<AccessGroup>, anyhow::Error> {
        self.lookup_guard()?;
        self.inner.find_group(group_id).await
    }

    async fn group_role(
        &self,
        group_id: i64,
        user_id: i64,
    ) -> Result<Option<AccessRole>, anyhow::Error> {
        self.lookup_guard()?;
        self.inner.group_role(group_id, user_id).await
    }

    async fn add_group_member(
        &self,
        group_id: i64,
        user_id: i64,
        role: AccessRole,
    ) -> Result<(), anyhow::Error> {
        self.inner.add_group_member(group_id, user_id, role).await
    }

    async fn link_group_lock(&self, group_id: i64, lock_id: i64) -> Result<(), anyhow::Error> {
        self.inner.link_group_lock(group_id, lock_id).await
    }

    async fn list_group_members(&self, group_id: i64) -> Result<Vec<GroupMember>, anyhow::Error> {
        self.lookup_guard()?;
        self.inner.list_group_members(group_id).await
    }

    async fn list_groups_for_user(&self, user_id: i64) -> Result<Vec<GroupSummary>, anyhow::Error> {
        self.lookup_guard()?;
        self.inner.list_groups_for_user(user_id).await
    }

    async fn append_audit(&self, entry: &NewAuditEntry) -> Result<i64, anyhow::Error> {
        self.audit_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_audit.load(Ordering::SeqCst) {
            anyhow::bail!("audit table unavailable");
        }
        self.inner.append_audit(entry).await
    }

    async fn audit_for_lock(
        &self,
        lock_id: i64,
        limit: Option<i64>,
    ) -> Result<Vec<AuditLogEntry>, anyhow::Error> {
        self.inner.audit_for_lock(lock_id, limit).await
    }

    async fn all_audit(&self, limit: i64) -> Result<Vec<AuditLogEntry>, anyhow::Error> {
        self.inner.all_audit(limit).await
    }

    async fn close(&self) {}
}

/// Wired application backed by [`FlakyStore`], with a mock Raspberry Pi
/// controller and a mock Mobikey relay.
pub struct TestApp {
    pub store: Arc<FlakyStore>,
    pub state: AppState,
    pub device: MockServer,
    pub relay: MockServer,
}

impl TestApp {
    pub async fn spawn() -> Self {
        let device = MockServer::start().await;
        let relay = MockServer::start().await;

        let store = Arc::new(FlakyStore::default());
        for (id, role) in [
            (OWNER_ID, "user"),
            (MEMBER_ID, "user"),
            (STRANGER_ID, "user"),
            (ADMIN_ID, "admin"),
        ] {
            store
                .inner
                .insert_user(user(id, role))
                .expect("Failed to seed user");
        }

        let client = reqwest::Client::new();
        let adapters = Adapters::new(
            RaspberryAdapter::new(
                client.clone(),
                Secret::new(PI_API_KEY.to_string()),
                fast_device_policy(),
            ),
            AviorAdapter::new(client, &relay.uri(), Duration::from_millis(500))
                .expect("Failed to build relay adapter"),
        );

        let state = AppState::new(
            store.clone(),
            Arc::new(JwtAuthenticator::new(&Secret::new(JWT_SECRET.to_string()))),
            adapters,
            Duration::from_secs(1),
        );

        Self {
            store,
            state,
            device,
            relay,
        }
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone(), &[])
    }

    /// `host:port` of the mock controller, as stored in `adapter_data.ip`.
    pub fn device_host(&self) -> String {
        self.device.address().to_string()
    }

    pub fn raspberry_data(&self, pin: u64) -> Value {
        json!({ "ip": self.device_host(), "pin": pin })
    }

    pub async fn seed_lock(&self, owner_id: i64, lock_type: &str, adapter_data: Value) -> Lock {
        self.store
            .inner
            .insert_lock(NewLock {
                owner_id,
                name: format!("{lock_type} door"),
                lock_type: lock_type.to_string(),
                adapter_data,
                owner_name: None,
                floor: None,
                room: None,
                address: None,
            })
            .await
            .expect("Failed to seed lock")
    }

    pub async fn seed_raspberry_lock(&self, owner_id: i64) -> Lock {
        self.seed_lock(owner_id, "raspberry", self.raspberry_data(1234))
            .await
    }
}
