use axum::{
    extract::{Path, Query, State},
    Json,
};
use service_core::error::AppError;
use validator::Validate;

use crate::dtos::LogsQuery;
use crate::middleware::auth::AuthUser;
use crate::models::AuditLogEntry;
use crate::AppState;

pub async fn all_logs(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Query(query): Query<LogsQuery>,
) -> Result<Json<Vec<AuditLogEntry>>, AppError> {
    query.validate()?;
    Ok(Json(
        state.audit_queries.all_logs(&identity, query.limit).await?,
    ))
}

pub async fn logs_for_lock(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(lock_id): Path<i64>,
    Query(query): Query<LogsQuery>,
) -> Result<Json<Vec<AuditLogEntry>>, AppError> {
    query.validate()?;
    Ok(Json(
        state
            .audit_queries
            .logs_for_lock(&identity, lock_id, query.limit)
            .await?,
    ))
}

pub async fn last_activity(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(lock_id): Path<i64>,
) -> Result<Json<AuditLogEntry>, AppError> {
    Ok(Json(
        state.audit_queries.last_activity(&identity, lock_id).await?,
    ))
}
