use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use validator::Validate;

use crate::dtos::{
    ActuationResponse, CreateLockRequest, GrantAccessRequest, GrantResponse, ListLocksQuery,
    UpdateAdapterRequest,
};
use crate::middleware::auth::AuthUser;
use crate::models::{AccessEntry, Action, Command, LockSummary};
use crate::services::CreateLock;
use crate::AppState;

#[tracing::instrument(skip(state, identity, request), fields(user_id = identity.id))]
pub async fn create_lock(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Json(request): Json<CreateLockRequest>,
) -> Result<(StatusCode, Json<LockSummary>), AppError> {
    request.validate()?;

    let lock = state
        .catalogue
        .create_lock(
            &identity,
            CreateLock {
                name: request.name,
                lock_type: request.lock_type,
                adapter_data: request.adapter_data,
                owner_name: request.owner_name,
                floor: request.floor,
                room: request.room,
                address: request.address,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(LockSummary::from(&lock))))
}

pub async fn list_locks(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Query(query): Query<ListLocksQuery>,
) -> Result<Json<Vec<LockSummary>>, AppError> {
    let locks = state
        .catalogue
        .list_accessible_locks(&identity, query.status)
        .await?;
    Ok(Json(locks))
}

pub async fn get_lock(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(lock_id): Path<i64>,
) -> Result<Json<LockSummary>, AppError> {
    Ok(Json(state.catalogue.get_lock(&identity, lock_id).await?))
}

pub async fn update_adapter(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(lock_id): Path<i64>,
    Json(request): Json<UpdateAdapterRequest>,
) -> Result<Json<LockSummary>, AppError> {
    let lock = state
        .catalogue
        .update_adapter_config(&identity, lock_id, request.adapter_data)
        .await?;
    Ok(Json(lock))
}

pub async fn open_lock(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(lock_id): Path<i64>,
) -> Result<Json<ActuationResponse>, AppError> {
    let result = state
        .actuation
        .actuate(&identity, lock_id, Command::Open)
        .await?;
    Ok(Json(ActuationResponse {
        lock_id,
        action: Action::Open,
        result,
    }))
}

pub async fn lock_lock(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(lock_id): Path<i64>,
) -> Result<Json<ActuationResponse>, AppError> {
    let result = state
        .actuation
        .actuate(&identity, lock_id, Command::Lock)
        .await?;
    Ok(Json(ActuationResponse {
        lock_id,
        action: Action::Lock,
        result,
    }))
}

pub async fn lock_status(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(lock_id): Path<i64>,
) -> Result<Json<ActuationResponse>, AppError> {
    let result = state.actuation.query_status(&identity, lock_id).await?;
    Ok(Json(ActuationResponse {
        lock_id,
        action: Action::Status,
        result,
    }))
}

pub async fn list_users_with_access(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(lock_id): Path<i64>,
) -> Result<Json<Vec<AccessEntry>>, AppError> {
    let users = state
        .sharing
        .list_users_with_access(&identity, lock_id)
        .await?;
    Ok(Json(users))
}

pub async fn grant_access(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(lock_id): Path<i64>,
    Json(request): Json<GrantAccessRequest>,
) -> Result<(StatusCode, Json<GrantResponse>), AppError> {
    request.validate()?;
    let grant = state
        .sharing
        .grant_access(&identity, lock_id, request.user_id, request.role())
        .await?;
    Ok((StatusCode::CREATED, Json(grant.into())))
}
