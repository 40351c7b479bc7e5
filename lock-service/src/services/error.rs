use crate::adapters::{AdapterError, ConfigurationError};
use service_core::error::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Access denied: {0}")]
    Denied(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Invalid adapter configuration: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Unsupported lock type '{0}'")]
    UnsupportedType(String),

    #[error("Lock adapter failed: {0}")]
    Adapter(#[from] AdapterError),

    #[error("Persistence error: {0}")]
    Persistence(#[source] anyhow::Error),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(#[source] anyhow::Error),
}

impl ServiceError {
    /// Terminal state label used in logs and the `outcome` metric label.
    pub fn terminal_state(&self) -> &'static str {
        match self {
            ServiceError::Denied(_) => "denied",
            ServiceError::NotFound(_) => "not_found",
            ServiceError::Configuration(_) => "config_invalid",
            ServiceError::UnsupportedType(_) => "unsupported_type",
            ServiceError::Adapter(_) => "adapter_failed",
            ServiceError::Persistence(_) => "persistence_failed",
            ServiceError::BadRequest(_) => "bad_request",
            ServiceError::Internal(_) => "internal",
        }
    }

    pub fn lock_not_found(lock_id: i64) -> Self {
        ServiceError::NotFound(format!("Lock {lock_id} not found"))
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Denied(msg) => AppError::Forbidden(anyhow::anyhow!(msg)),
            ServiceError::NotFound(msg) => AppError::NotFound(anyhow::anyhow!(msg)),
            ServiceError::Configuration(e) => {
                AppError::BadRequest(anyhow::anyhow!("Invalid adapter configuration: {}", e))
            }
            ServiceError::UnsupportedType(t) => {
                AppError::NotImplemented(anyhow::anyhow!("Unsupported lock type '{}'", t))
            }
            ServiceError::Adapter(e) => AppError::BadGateway(e.to_string()),
            ServiceError::Persistence(e) => AppError::DatabaseError(e),
            ServiceError::BadRequest(msg) => AppError::BadRequest(anyhow::anyhow!(msg)),
            ServiceError::Internal(e) => AppError::InternalError(e),
        }
    }
}
