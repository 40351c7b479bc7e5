pub mod access;
pub mod actuation;
pub mod audit;
pub mod auth;
pub mod catalogue;
pub mod database;
pub mod error;
pub mod logs;
pub mod memory;
pub mod metrics;
pub mod sharing;
pub mod store;

pub use access::{AccessDecision, AccessGrant, AccessResolver};
pub use actuation::ActuationService;
pub use audit::AuditLogger;
pub use auth::{Authenticator, JwtAuthenticator, TokenClaims};
pub use catalogue::{CreateLock, LockCatalogue};
pub use database::PgStore;
pub use error::ServiceError;
pub use logs::AuditQueries;
pub use memory::InMemoryStore;
pub use metrics::{get_metrics, init_metrics};
pub use sharing::SharingService;
pub use store::LockStore;
