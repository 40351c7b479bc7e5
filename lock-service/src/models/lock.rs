use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// Lock row. `adapter_data` is kept exactly as stored; it is only
/// interpreted by `AdapterConfig::parse`.
#[derive(Debug, Clone, FromRow)]
pub struct Lock {
    pub id: i64,
    pub name: String,
    pub lock_type: String,
    pub adapter_data: serde_json::Value,
    pub owner_id: i64,
    pub owner_name: Option<String>,
    pub floor: Option<String>,
    pub room: Option<String>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a lock.
#[derive(Debug, Clone)]
pub struct NewLock {
    pub owner_id: i64,
    pub name: String,
    pub lock_type: String,
    pub adapter_data: serde_json::Value,
    pub owner_name: Option<String>,
    pub floor: Option<String>,
    pub room: Option<String>,
    pub address: Option<String>,
}

/// Public view of a lock. Never carries `adapter_data`.
#[derive(Debug, Clone, Serialize)]
pub struct LockSummary {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub lock_type: String,
    pub owner_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub floor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Opaque device status when it was fetched live.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<serde_json::Value>,
}

impl From<&Lock> for LockSummary {
    fn from(lock: &Lock) -> Self {
        Self {
            id: lock.id,
            name: lock.name.clone(),
            lock_type: lock.lock_type.clone(),
            owner_id: lock.owner_id,
            owner_name: lock.owner_name.clone(),
            floor: lock.floor.clone(),
            room: lock.room.clone(),
            address: lock.address.clone(),
            status: None,
        }
    }
}
