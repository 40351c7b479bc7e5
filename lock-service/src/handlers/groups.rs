use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use validator::Validate;

use crate::dtos::{AddMemberRequest, CreateGroupRequest, LinkLockRequest, LinkLockResponse};
use crate::middleware::auth::AuthUser;
use crate::models::{AccessGroup, GroupMember, GroupSummary};
use crate::AppState;

pub async fn create_group(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Json(request): Json<CreateGroupRequest>,
) -> Result<(StatusCode, Json<AccessGroup>), AppError> {
    request.validate()?;
    let group = state.sharing.create_group(&identity, &request.name).await?;
    Ok((StatusCode::CREATED, Json(group)))
}

pub async fn list_my_groups(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> Result<Json<Vec<GroupSummary>>, AppError> {
    Ok(Json(state.sharing.list_my_groups(&identity).await?))
}

pub async fn add_member(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(group_id): Path<i64>,
    Json(request): Json<AddMemberRequest>,
) -> Result<(StatusCode, Json<GroupMember>), AppError> {
    request.validate()?;
    let member = state
        .sharing
        .add_group_member(&identity, group_id, request.user_id, request.role())
        .await?;
    Ok((StatusCode::CREATED, Json(member)))
}

pub async fn list_members(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(group_id): Path<i64>,
) -> Result<Json<Vec<GroupMember>>, AppError> {
    Ok(Json(
        state.sharing.list_group_members(&identity, group_id).await?,
    ))
}

pub async fn link_lock(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(group_id): Path<i64>,
    Json(request): Json<LinkLockRequest>,
) -> Result<(StatusCode, Json<LinkLockResponse>), AppError> {
    request.validate()?;
    state
        .sharing
        .link_group_lock(&identity, group_id, request.lock_id)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(LinkLockResponse {
            group_id,
            lock_id: request.lock_id,
        }),
    ))
}
