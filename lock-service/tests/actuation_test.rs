//! End-to-end actuation scenarios: authorization, validation, dispatch and
//! the audit trail they leave.

mod common;

use common::{TestApp, ADMIN_ID, MEMBER_ID, OWNER_ID, STRANGER_ID};
use lock_service::models::{AccessRole, AccessSource, Action, Command, Identity};
use lock_service::services::catalogue::LIVE_STATUS_CONCURRENCY;
use lock_service::services::ServiceError;
use serde_json::json;
use service_core::error::AppError;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_device(server: &MockServer, route: &str, http_method: &str, body: serde_json::Value) {
    Mock::given(method(http_method))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

async fn device_calls(app: &TestApp) -> usize {
    app.device
        .received_requests()
        .await
        .map(|requests| requests.len())
        .unwrap_or_default()
}

#[tokio::test]
async fn owner_opens_lock_and_success_is_audited() {
    let app = TestApp::spawn().await;
    mount_device(&app.device, "/open", "POST", json!({ "opened": true })).await;
    let lock = app.seed_raspberry_lock(OWNER_ID).await;

    let result = app
        .state
        .actuation
        .actuate(&Identity::user(OWNER_ID), lock.id, Command::Open)
        .await
        .unwrap();

    assert_eq!(result, json!({ "opened": true }));
    let audit = app.store.audit_entries();
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].user_id, OWNER_ID);
    assert_eq!(audit[0].lock_id, lock.id);
    assert_eq!(audit[0].action, Action::Open);
    assert!(audit[0].success);
}

#[tokio::test]
async fn stranger_is_denied_without_touching_the_device() {
    let app = TestApp::spawn().await;
    mount_device(&app.device, "/open", "POST", json!({ "opened": true })).await;
    let lock = app.seed_raspberry_lock(OWNER_ID).await;

    let err = app
        .state
        .actuation
        .actuate(&Identity::user(STRANGER_ID), lock.id, Command::Open)
        .await
        .unwrap_err();

    assert!(matches!(err, ServiceError::Denied(_)));
    assert_eq!(AppError::from(err).status_code().as_u16(), 403);
    assert_eq!(device_calls(&app).await, 0);

    let audit = app.store.audit_entries();
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].user_id, STRANGER_ID);
    assert!(!audit[0].success);
}

#[tokio::test]
async fn missing_lock_is_denied_for_users_and_not_found_for_admins() {
    let app = TestApp::spawn().await;

    let err = app
        .state
        .actuation
        .actuate(&Identity::user(STRANGER_ID), 404, Command::Open)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Denied(_)));

    let err = app
        .state
        .actuation
        .actuate(&Identity::admin(ADMIN_ID), 404, Command::Open)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));

    assert_eq!(app.store.audit_entries().len(), 2);
}

#[tokio::test]
async fn missing_pin_fails_before_any_network_call() {
    let app = TestApp::spawn().await;
    let lock = app
        .seed_lock(OWNER_ID, "raspberry", json!({ "ip": app.device_host() }))
        .await;

    let err = app
        .state
        .actuation
        .actuate(&Identity::user(OWNER_ID), lock.id, Command::Open)
        .await
        .unwrap_err();

    assert!(matches!(err, ServiceError::Configuration(_)));
    assert!(err.to_string().contains("pin"));
    assert_eq!(AppError::from(err).status_code().as_u16(), 400);
    assert_eq!(device_calls(&app).await, 0);

    let audit = app.store.audit_entries();
    assert_eq!(audit.len(), 1);
    assert!(!audit[0].success);
}

#[tokio::test]
async fn unknown_vendor_is_unsupported() {
    let app = TestApp::spawn().await;
    let lock = app
        .seed_lock(OWNER_ID, "unknown-vendor", json!({ "anything": true }))
        .await;

    let err = app
        .state
        .actuation
        .actuate(&Identity::user(OWNER_ID), lock.id, Command::Lock)
        .await
        .unwrap_err();

    assert!(matches!(err, ServiceError::UnsupportedType(ref t) if t == "unknown-vendor"));
    assert_eq!(AppError::from(err).status_code().as_u16(), 501);

    let audit = app.store.audit_entries();
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].action, Action::Lock);
    assert!(!audit[0].success);
}

#[tokio::test]
async fn device_error_is_reported_as_adapter_failure() {
    let app = TestApp::spawn().await;
    Mock::given(method("POST"))
        .and(path("/open"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&app.device)
        .await;
    let lock = app.seed_raspberry_lock(OWNER_ID).await;

    let err = app
        .state
        .actuation
        .actuate(&Identity::user(OWNER_ID), lock.id, Command::Open)
        .await
        .unwrap_err();

    assert!(matches!(err, ServiceError::Adapter(_)));
    assert_eq!(AppError::from(err).status_code().as_u16(), 502);

    let audit = app.store.audit_entries();
    assert_eq!(audit.len(), 1);
    assert!(!audit[0].success);
}

#[tokio::test]
async fn store_outage_is_internal_and_still_audited() {
    let app = TestApp::spawn().await;
    let lock = app.seed_raspberry_lock(OWNER_ID).await;
    app.store.fail_lookups.store(true, Ordering::SeqCst);

    let err = app
        .state
        .actuation
        .actuate(&Identity::user(OWNER_ID), lock.id, Command::Open)
        .await
        .unwrap_err();

    assert!(matches!(err, ServiceError::Persistence(_)));
    assert_eq!(AppError::from(err).status_code().as_u16(), 500);
    assert_eq!(device_calls(&app).await, 0);
    assert_eq!(app.store.audit_attempts.load(Ordering::SeqCst), 1);

    let audit = app.store.audit_entries();
    assert_eq!(audit.len(), 1);
    assert!(!audit[0].success);
}

#[tokio::test]
async fn audit_failure_does_not_change_the_outcome() {
    let app = TestApp::spawn().await;
    mount_device(&app.device, "/lock", "POST", json!({ "locked": true })).await;
    let lock = app.seed_raspberry_lock(OWNER_ID).await;
    app.store.fail_audit.store(true, Ordering::SeqCst);

    let result = app
        .state
        .actuation
        .actuate(&Identity::user(OWNER_ID), lock.id, Command::Lock)
        .await
        .unwrap();

    assert_eq!(result, json!({ "locked": true }));
    assert_eq!(app.store.audit_attempts.load(Ordering::SeqCst), 1);
    assert!(app.store.audit_entries().is_empty());
}

#[tokio::test]
async fn status_is_passed_through_unchanged_and_audited() {
    let app = TestApp::spawn().await;
    let body = json!({ "state": "locked", "battery": 87 });
    mount_device(&app.device, "/status", "GET", body.clone()).await;
    let lock = app.seed_raspberry_lock(OWNER_ID).await;
    let owner = Identity::user(OWNER_ID);

    let first = app.state.actuation.query_status(&owner, lock.id).await.unwrap();
    let second = app.state.actuation.query_status(&owner, lock.id).await.unwrap();

    assert_eq!(first, body);
    assert_eq!(first, second);

    let audit = app.store.audit_entries();
    assert_eq!(audit.len(), 2);
    assert!(audit.iter().all(|e| e.action == Action::Status && e.success));
}

#[tokio::test]
async fn group_member_can_open_a_linked_lock() {
    let app = TestApp::spawn().await;
    mount_device(&app.device, "/open", "POST", json!({ "opened": true })).await;
    let lock = app.seed_raspberry_lock(OWNER_ID).await;
    let owner = Identity::user(OWNER_ID);
    let member = Identity::user(MEMBER_ID);

    let err = app
        .state
        .actuation
        .actuate(&member, lock.id, Command::Open)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Denied(_)));

    let group = app.state.sharing.create_group(&owner, "Office").await.unwrap();
    app.state
        .sharing
        .add_group_member(&owner, group.id, MEMBER_ID, AccessRole::Member)
        .await
        .unwrap();
    app.state
        .sharing
        .link_group_lock(&owner, group.id, lock.id)
        .await
        .unwrap();

    app.state
        .actuation
        .actuate(&member, lock.id, Command::Open)
        .await
        .unwrap();
}

#[tokio::test]
async fn access_list_collapses_to_the_highest_role() {
    let app = TestApp::spawn().await;
    let lock = app.seed_raspberry_lock(OWNER_ID).await;
    let owner = Identity::user(OWNER_ID);

    let group = app.state.sharing.create_group(&owner, "Family").await.unwrap();
    app.state
        .sharing
        .add_group_member(&owner, group.id, MEMBER_ID, AccessRole::Member)
        .await
        .unwrap();
    app.state
        .sharing
        .link_group_lock(&owner, group.id, lock.id)
        .await
        .unwrap();
    app.state
        .sharing
        .grant_access(&owner, lock.id, MEMBER_ID, AccessRole::Admin)
        .await
        .unwrap();

    let users = app
        .state
        .sharing
        .list_users_with_access(&owner, lock.id)
        .await
        .unwrap();

    let owner_rows: Vec<_> = users.iter().filter(|u| u.user_id == OWNER_ID).collect();
    assert_eq!(owner_rows.len(), 1);
    assert_eq!(owner_rows[0].role, AccessRole::Owner);
    assert_eq!(owner_rows[0].source, AccessSource::Owner);

    let member_rows: Vec<_> = users.iter().filter(|u| u.user_id == MEMBER_ID).collect();
    assert_eq!(member_rows.len(), 1);
    assert_eq!(member_rows[0].role, AccessRole::Admin);
    assert_eq!(member_rows[0].source, AccessSource::DirectGrant);
}

#[tokio::test]
async fn grants_cannot_confer_ownership() {
    let app = TestApp::spawn().await;
    let lock = app.seed_raspberry_lock(OWNER_ID).await;

    let err = app
        .state
        .sharing
        .grant_access(&Identity::user(OWNER_ID), lock.id, MEMBER_ID, AccessRole::Owner)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::BadRequest(_)));

    let err = app
        .state
        .sharing
        .grant_access(&Identity::user(MEMBER_ID), lock.id, STRANGER_ID, AccessRole::Member)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Denied(_)));
}

#[tokio::test]
async fn lock_logs_are_newest_first_and_owner_only() {
    let app = TestApp::spawn().await;
    mount_device(&app.device, "/open", "POST", json!({ "opened": true })).await;
    mount_device(&app.device, "/lock", "POST", json!({ "locked": true })).await;
    let lock = app.seed_raspberry_lock(OWNER_ID).await;
    let owner = Identity::user(OWNER_ID);

    app.state.actuation.actuate(&owner, lock.id, Command::Open).await.unwrap();
    app.state.actuation.actuate(&owner, lock.id, Command::Lock).await.unwrap();

    let logs = app
        .state
        .audit_queries
        .logs_for_lock(&owner, lock.id, None)
        .await
        .unwrap();
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0].action, Action::Lock);
    assert_eq!(logs[1].action, Action::Open);

    let last = app
        .state
        .audit_queries
        .last_activity(&owner, lock.id)
        .await
        .unwrap();
    assert_eq!(last.action, Action::Lock);

    let err = app
        .state
        .audit_queries
        .logs_for_lock(&Identity::user(STRANGER_ID), lock.id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Denied(_)));

    let err = app
        .state
        .audit_queries
        .all_logs(&owner, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Denied(_)));
    assert_eq!(
        app.state
            .audit_queries
            .all_logs(&Identity::admin(ADMIN_ID), None)
            .await
            .unwrap()
            .len(),
        2
    );
}

#[tokio::test]
async fn listing_reads_live_status_a_bounded_number_at_a_time() {
    let app = TestApp::spawn().await;
    let delay = Duration::from_millis(150);
    let count = LIVE_STATUS_CONCURRENCY + 2;
    Mock::given(method("GET"))
        .and(path("/status"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "locked": true }))
                .set_delay(delay),
        )
        .expect(count as u64)
        .mount(&app.device)
        .await;

    let mut ids = Vec::new();
    for _ in 0..count {
        ids.push(app.seed_raspberry_lock(OWNER_ID).await.id);
    }

    let started = Instant::now();
    let summaries = app
        .state
        .catalogue
        .list_accessible_locks(&Identity::user(OWNER_ID), true)
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert_eq!(summaries.iter().map(|s| s.id).collect::<Vec<_>>(), ids);
    assert!(summaries
        .iter()
        .all(|s| s.status == Some(json!({ "locked": true }))));
    // More locks than slots, so the reads take at least two rounds.
    assert!(elapsed >= delay * 2, "listing took {elapsed:?}");
    assert!(app.store.audit_entries().is_empty());
}
