use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Anything an actuation attempt can ask of a lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Open,
    Lock,
    Status,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Open => "open",
            Action::Lock => "lock",
            Action::Status => "status",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(Action::Open),
            "lock" => Some(Action::Lock),
            "status" => Some(Action::Status),
            _ => None,
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State-changing subset of [`Action`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Open,
    Lock,
}

impl From<Command> for Action {
    fn from(command: Command) -> Self {
        match command {
            Command::Open => Action::Open,
            Command::Lock => Action::Lock,
        }
    }
}

/// Audit row to append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAuditEntry {
    pub user_id: i64,
    pub lock_id: i64,
    pub action: Action,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
}

impl NewAuditEntry {
    pub fn new(user_id: i64, lock_id: i64, action: Action, success: bool) -> Self {
        Self {
            user_id,
            lock_id,
            action,
            success,
            timestamp: Utc::now(),
        }
    }
}

/// Stored audit row, joined with the acting user's display name when known.
#[derive(Debug, Clone, Serialize)]
pub struct AuditLogEntry {
    pub id: i64,
    pub user_id: i64,
    pub lock_id: i64,
    pub action: Action,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock_name: Option<String>,
}
