//! Lock adapters.
//!
//! Each supported `Lock.type` maps to one [`LockKind`]. Stored `adapter_data`
//! is parsed into the matching [`AdapterConfig`] variant before any request
//! leaves the process, so a garbled configuration never reaches the wire.
//! [`Adapters`] then dispatches an [`Action`] to the protocol client for that
//! variant.

pub mod avior;
pub mod raspberry;
pub mod retry;

use crate::models::Action;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

pub use avior::{AviorAdapter, AviorConfig};
pub use raspberry::{RaspberryAdapter, RaspberryConfig};
pub use retry::RetryPolicy;

/// Closed set of lock families this service can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LockKind {
    /// Raspberry Pi on the local network, reached directly over HTTP.
    Raspberry,
    /// Avior lock behind the Mobikey cloud relay.
    Avior,
}

impl LockKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LockKind::Raspberry => "raspberry",
            LockKind::Avior => "avior",
        }
    }

    /// Resolve a stored `Lock.type`. `None` means the type is unsupported.
    pub fn parse(lock_type: &str) -> Option<Self> {
        match lock_type {
            "raspberry" => Some(LockKind::Raspberry),
            "avior" => Some(LockKind::Avior),
            _ => None,
        }
    }
}

impl std::fmt::Display for LockKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored adapter configuration failed validation. Messages name fields,
/// never values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("adapter_data must be a JSON object")]
    NotAnObject,

    #[error("adapter_data is missing required field '{0}'")]
    MissingField(&'static str),

    #[error("adapter_data field '{field}' is invalid: {reason}")]
    InvalidField {
        field: &'static str,
        reason: &'static str,
    },
}

/// Device or relay failure. Never carries secrets or URLs.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// No response was received; retries, if any, are exhausted.
    #[error("{kind} lock did not respond to {action} after {attempts} attempt(s): {cause}")]
    Unreachable {
        kind: LockKind,
        action: Action,
        attempts: u32,
        cause: String,
    },

    /// The device answered and refused.
    #[error("{kind} lock rejected {action} with HTTP {status}")]
    Rejected {
        kind: LockKind,
        action: Action,
        status: u16,
    },

    /// The device answered but the body could not be read.
    #[error("{kind} lock sent an unreadable response to {action}: {cause}")]
    InvalidResponse {
        kind: LockKind,
        action: Action,
        cause: String,
    },
}

impl AdapterError {
    pub fn is_transient(&self) -> bool {
        matches!(self, AdapterError::Unreachable { .. })
    }
}

/// Typed adapter configuration, one variant per [`LockKind`].
#[derive(Debug, Clone)]
pub enum AdapterConfig {
    Raspberry(RaspberryConfig),
    Avior(AviorConfig),
}

impl AdapterConfig {
    /// Validate stored `adapter_data` for `kind`. Unknown fields are ignored.
    pub fn parse(kind: LockKind, data: &Value) -> Result<Self, ConfigurationError> {
        let fields = data.as_object().ok_or(ConfigurationError::NotAnObject)?;
        match kind {
            LockKind::Raspberry => RaspberryConfig::from_fields(fields).map(Self::Raspberry),
            LockKind::Avior => AviorConfig::from_fields(fields).map(Self::Avior),
        }
    }

    pub fn kind(&self) -> LockKind {
        match self {
            AdapterConfig::Raspberry(_) => LockKind::Raspberry,
            AdapterConfig::Avior(_) => LockKind::Avior,
        }
    }
}

/// Dispatch table over the supported lock families.
#[derive(Clone)]
pub struct Adapters {
    raspberry: RaspberryAdapter,
    avior: AviorAdapter,
}

impl Adapters {
    pub fn new(raspberry: RaspberryAdapter, avior: AviorAdapter) -> Self {
        Self { raspberry, avior }
    }

    /// Run one action against the device described by `config`.
    pub async fn execute(&self, action: Action, config: &AdapterConfig) -> Result<Value, AdapterError> {
        match config {
            AdapterConfig::Raspberry(config) => self.raspberry.execute(action, config).await,
            AdapterConfig::Avior(config) => self.avior.execute(action, config).await,
        }
    }
}

/// Device bodies are passed through uninterpreted: JSON when they parse,
/// otherwise the raw text.
pub(crate) fn opaque_body(body: String) -> Value {
    match serde_json::from_str::<Value>(&body) {
        Ok(value) => value,
        Err(_) => Value::String(body),
    }
}

pub(crate) fn required<'a>(
    fields: &'a Map<String, Value>,
    field: &'static str,
) -> Result<&'a Value, ConfigurationError> {
    match fields.get(field) {
        None | Some(Value::Null) => Err(ConfigurationError::MissingField(field)),
        Some(value) => Ok(value),
    }
}

/// Non-empty, trimmed string field.
pub(crate) fn required_str(
    fields: &Map<String, Value>,
    field: &'static str,
) -> Result<String, ConfigurationError> {
    required_verbatim(fields, field).map(|s| s.trim().to_string())
}

/// Non-blank string field, returned exactly as stored. Used for credentials
/// and identifiers the device compares byte for byte.
pub(crate) fn required_verbatim(
    fields: &Map<String, Value>,
    field: &'static str,
) -> Result<String, ConfigurationError> {
    match required(fields, field)? {
        Value::String(s) if s.trim().is_empty() => Err(ConfigurationError::MissingField(field)),
        Value::String(s) => Ok(s.clone()),
        _ => Err(ConfigurationError::InvalidField {
            field,
            reason: "expected a string",
        }),
    }
}

/// Non-negative integer given as a JSON number or a string of digits.
pub(crate) fn required_uint(
    fields: &Map<String, Value>,
    field: &'static str,
) -> Result<u64, ConfigurationError> {
    let invalid = ConfigurationError::InvalidField {
        field,
        reason: "expected a non-negative integer",
    };
    match required(fields, field)? {
        Value::Number(n) => n.as_u64().ok_or(invalid),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return Err(ConfigurationError::MissingField(field));
            }
            if !s.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid);
            }
            s.parse::<u64>().map_err(|_| invalid)
        }
        _ => Err(invalid),
    }
}
