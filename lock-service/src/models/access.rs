//! Sharing relations: direct grants, access groups and the role vocabulary
//! they share.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Role attached to a grant or group membership.
///
/// Ordered by precedence: `Owner > Admin > Member`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessRole {
    Member,
    Admin,
    Owner,
}

impl AccessRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessRole::Owner => "owner",
            AccessRole::Admin => "admin",
            AccessRole::Member => "member",
        }
    }

    /// Lenient parse; legacy Norwegian role names are still found in old rows.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "owner" | "eier" => AccessRole::Owner,
            "admin" => AccessRole::Admin,
            _ => AccessRole::Member,
        }
    }

    /// Whether this group role may manage the group's members and locks.
    pub fn can_manage(&self) -> bool {
        matches!(self, AccessRole::Owner | AccessRole::Admin)
    }
}

/// Which relation put a user on a lock's access list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessSource {
    Owner,
    DirectGrant,
    Group,
}

/// Explicit (user, lock, role) permission outside any group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectGrant {
    pub user_id: i64,
    pub lock_id: i64,
    pub role: AccessRole,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AccessGroup {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Member row of one group.
#[derive(Debug, Clone, Serialize)]
pub struct GroupMember {
    pub user_id: i64,
    pub email: Option<String>,
    pub role: AccessRole,
}

/// A group as seen by one of its members.
#[derive(Debug, Clone, Serialize)]
pub struct GroupSummary {
    pub id: i64,
    pub name: String,
    pub role: AccessRole,
    pub user_count: i64,
    pub lock_count: i64,
}

/// One row of a lock's access list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessEntry {
    pub user_id: i64,
    pub email: Option<String>,
    pub role: AccessRole,
    pub source: AccessSource,
}
