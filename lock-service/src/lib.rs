pub mod adapters;
pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;

use axum::http::{header, HeaderValue, Method};
use axum::middleware::{from_fn, from_fn_with_state};
use axum::{
    routing::{get, post, put},
    Router,
};
use service_core::middleware::{
    metrics::metrics_middleware,
    security_headers::security_headers_middleware,
    tracing::{http_span, request_id_middleware},
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use adapters::Adapters;
use services::{
    AccessResolver, ActuationService, AuditLogger, AuditQueries, Authenticator, LockCatalogue,
    LockStore, SharingService,
};

pub use startup::Application;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn LockStore>,
    pub authenticator: Arc<dyn Authenticator>,
    pub actuation: ActuationService,
    pub catalogue: LockCatalogue,
    pub sharing: SharingService,
    pub audit_queries: AuditQueries,
}

impl AppState {
    /// Wire the services around one store, authenticator and adapter set.
    pub fn new(
        store: Arc<dyn LockStore>,
        authenticator: Arc<dyn Authenticator>,
        adapters: Adapters,
        audit_wait: Duration,
    ) -> Self {
        let resolver = AccessResolver::new(store.clone());
        let audit = AuditLogger::new(store.clone(), audit_wait);

        Self {
            actuation: ActuationService::new(
                store.clone(),
                resolver.clone(),
                adapters.clone(),
                audit,
            ),
            catalogue: LockCatalogue::new(store.clone(), resolver.clone(), adapters),
            sharing: SharingService::new(store.clone(), resolver),
            audit_queries: AuditQueries::new(store.clone()),
            store,
            authenticator,
        }
    }
}

pub fn build_router(state: AppState, allowed_origins: &[String]) -> Router {
    let protected = Router::new()
        .route(
            "/locks",
            post(handlers::locks::create_lock).get(handlers::locks::list_locks),
        )
        .route("/locks/:id", get(handlers::locks::get_lock))
        .route("/locks/:id/adapter", put(handlers::locks::update_adapter))
        .route("/locks/:id/open", post(handlers::locks::open_lock))
        .route("/locks/:id/lock", post(handlers::locks::lock_lock))
        .route("/locks/:id/status", get(handlers::locks::lock_status))
        .route(
            "/locks/:id/users",
            get(handlers::locks::list_users_with_access),
        )
        .route("/locks/:id/grants", post(handlers::locks::grant_access))
        .route("/accessgroup", post(handlers::groups::create_group))
        .route("/accessgroup/list", get(handlers::groups::list_my_groups))
        .route(
            "/accessgroup/:id/members",
            post(handlers::groups::add_member).get(handlers::groups::list_members),
        )
        .route("/accessgroup/:id/locks", post(handlers::groups::link_lock))
        .route("/logs", get(handlers::logs::all_logs))
        .route("/logs/:lock_id", get(handlers::logs::logs_for_lock))
        .route("/logs/:lock_id/last", get(handlers::logs::last_activity))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ));

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!("Invalid CORS origin '{}': {}. Skipping.", origin, e);
                None
            }
        })
        .collect();

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_endpoint))
        .merge(protected)
        // Route layer so the matched path template is known when recording.
        .route_layer(from_fn(metrics_middleware))
        .with_state(state)
        .layer(TraceLayer::new_for_http().make_span_with(http_span::<axum::body::Body>))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
                .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]),
        )
}
