//! Router-level tests: authentication, status mapping and response shapes.

mod common;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use common::{token_for, TestApp, MEMBER_ID, OWNER_ID, STRANGER_ID};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.router().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn authed(method: Method, uri: &str, token: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"));
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

#[tokio::test]
async fn health_needs_no_token() {
    let app = TestApp::spawn().await;
    let request = Request::get("/health").body(Body::empty()).unwrap();

    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "lock-service");
}

#[tokio::test]
async fn readiness_follows_the_store() {
    let app = TestApp::spawn().await;
    let (status, _) = send(&app, Request::get("/ready").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);

    app.store
        .fail_lookups
        .store(true, std::sync::atomic::Ordering::SeqCst);
    let (status, _) = send(&app, Request::get("/ready").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn protected_routes_reject_missing_and_bad_tokens() {
    let app = TestApp::spawn().await;

    let (status, _) = send(&app, Request::get("/locks").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, authed(Method::GET, "/locks", "not-a-jwt", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn token_may_come_from_the_query_string() {
    let app = TestApp::spawn().await;
    let uri = format!("/locks?token={}", token_for(OWNER_ID, "user"));

    let (status, body) = send(&app, Request::get(uri).body(Body::empty()).unwrap()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn open_maps_outcomes_to_status_codes() {
    let app = TestApp::spawn().await;
    Mock::given(method("POST"))
        .and(path("/open"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "opened": true })))
        .mount(&app.device)
        .await;
    let lock = app.seed_raspberry_lock(OWNER_ID).await;
    let uri = format!("/locks/{}/open", lock.id);

    let (status, _) = send(
        &app,
        authed(Method::POST, &uri, &token_for(STRANGER_ID, "user"), None),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        authed(Method::POST, &uri, &token_for(OWNER_ID, "user"), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["lock_id"], lock.id);
    assert_eq!(body["action"], "open");
    assert_eq!(body["result"], json!({ "opened": true }));

    let (status, _) = send(
        &app,
        authed(Method::POST, "/locks/9999/open", &token_for(OWNER_ID, "admin"), None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn create_lock_validates_and_hides_adapter_data() {
    let app = TestApp::spawn().await;
    let token = token_for(OWNER_ID, "user");

    let (status, body) = send(
        &app,
        authed(
            Method::POST,
            "/locks",
            &token,
            Some(json!({
                "name": "Front door",
                "type": "raspberry",
                "adapter_data": { "ip": "10.0.0.5", "pin": 4321 },
                "floor": "1"
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["type"], "raspberry");
    assert_eq!(body["owner_id"], OWNER_ID);
    assert!(body.get("adapter_data").is_none());
    assert!(!body.to_string().contains("4321"));

    let (status, _) = send(
        &app,
        authed(
            Method::POST,
            "/locks",
            &token,
            Some(json!({ "name": "Gate", "type": "raspberry", "adapter_data": { "ip": "10.0.0.6" } })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        authed(
            Method::POST,
            "/locks",
            &token,
            Some(json!({ "name": "Shed", "type": "acme", "adapter_data": {} })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
}

#[tokio::test]
async fn access_list_is_for_owners_only() {
    let app = TestApp::spawn().await;
    let lock = app.seed_raspberry_lock(OWNER_ID).await;
    let uri = format!("/locks/{}/users", lock.id);

    let (status, body) = send(
        &app,
        authed(Method::GET, &uri, &token_for(OWNER_ID, "user"), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["user_id"], OWNER_ID);
    assert_eq!(body[0]["role"], "owner");

    let (status, _) = send(
        &app,
        authed(Method::GET, &uri, &token_for(MEMBER_ID, "user"), None),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn grant_then_list_shows_the_grantee() {
    let app = TestApp::spawn().await;
    let lock = app.seed_raspberry_lock(OWNER_ID).await;
    let owner_token = token_for(OWNER_ID, "user");

    let (status, body) = send(
        &app,
        authed(
            Method::POST,
            &format!("/locks/{}/grants", lock.id),
            &owner_token,
            Some(json!({ "user_id": MEMBER_ID, "role": "admin" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["role"], "admin");

    let (status, body) = send(
        &app,
        authed(Method::GET, "/locks", &token_for(MEMBER_ID, "user"), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(1));
    assert_eq!(body[0]["id"], lock.id);
}
