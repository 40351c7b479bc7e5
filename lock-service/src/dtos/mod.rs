use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use crate::models::{AccessRole, Action, DirectGrant};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateLockRequest {
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: String,
    #[serde(rename = "type")]
    #[validate(length(min = 1, message = "Type is required"))]
    pub lock_type: String,
    pub adapter_data: Value,
    pub owner_name: Option<String>,
    pub floor: Option<String>,
    pub room: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateAdapterRequest {
    pub adapter_data: Value,
}

#[derive(Debug, Deserialize, Validate)]
pub struct GrantAccessRequest {
    #[validate(range(min = 1, message = "Invalid user id"))]
    pub user_id: i64,
    /// Defaults to `member`.
    pub role: Option<String>,
}

impl GrantAccessRequest {
    pub fn role(&self) -> AccessRole {
        self.role
            .as_deref()
            .map(AccessRole::parse)
            .unwrap_or(AccessRole::Member)
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateGroupRequest {
    #[validate(length(min = 1, max = 100, message = "Group name must be 1-100 characters"))]
    pub name: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddMemberRequest {
    #[validate(range(min = 1, message = "Invalid user id"))]
    pub user_id: i64,
    pub role: Option<String>,
}

impl AddMemberRequest {
    pub fn role(&self) -> AccessRole {
        self.role
            .as_deref()
            .map(AccessRole::parse)
            .unwrap_or(AccessRole::Member)
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct LinkLockRequest {
    #[validate(range(min = 1, message = "Invalid lock id"))]
    pub lock_id: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListLocksQuery {
    /// Fetch live status for every lock.
    #[serde(default)]
    pub status: bool,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct LogsQuery {
    #[validate(range(min = 1, max = 5000, message = "Limit must be 1-5000"))]
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ActuationResponse {
    pub lock_id: i64,
    pub action: Action,
    /// Device response, passed through as received.
    pub result: Value,
}

#[derive(Debug, Serialize)]
pub struct GrantResponse {
    pub user_id: i64,
    pub lock_id: i64,
    pub role: AccessRole,
}

impl From<DirectGrant> for GrantResponse {
    fn from(grant: DirectGrant) -> Self {
        Self {
            user_id: grant.user_id,
            lock_id: grant.lock_id,
            role: grant.role,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LinkLockResponse {
    pub group_id: i64,
    pub lock_id: i64,
}
