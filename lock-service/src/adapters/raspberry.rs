//! Raspberry Pi lock controller reached directly over the local network.
//!
//! `POST http://{ip}/open` and `/lock` take `{"pin": <pin>}`; status is
//! `GET http://{ip}/status?pin=<pin>`. Every request carries the shared
//! `x-api-key`.

use super::retry::{send_with_retry, RetryPolicy};
use super::{opaque_body, required_str, required_uint, AdapterError, ConfigurationError, LockKind};
use crate::models::Action;
use reqwest::{Client, RequestBuilder, Url};
use secrecy::{ExposeSecret, Secret};
use serde_json::{json, Map, Value};
use std::fmt;
use tracing::{info, warn};

pub const API_KEY_HEADER: &str = "x-api-key";

/// Validated per-lock configuration.
#[derive(Clone, PartialEq, Eq)]
pub struct RaspberryConfig {
    /// Host or `host:port`.
    pub ip: String,
    pub pin: u64,
}

impl fmt::Debug for RaspberryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RaspberryConfig")
            .field("ip", &self.ip)
            .field("pin", &"****")
            .finish()
    }
}

impl RaspberryConfig {
    pub(crate) fn from_fields(fields: &Map<String, Value>) -> Result<Self, ConfigurationError> {
        let ip = required_str(fields, "ip")?;
        validate_host(&ip)?;
        let pin = required_uint(fields, "pin")?;
        Ok(Self { ip, pin })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("http://{}/{}", self.ip, path)
    }
}

/// Accept a bare host or `host:port`; anything that would change the
/// request path or authority is rejected.
fn validate_host(ip: &str) -> Result<(), ConfigurationError> {
    let invalid = ConfigurationError::InvalidField {
        field: "ip",
        reason: "expected a host or host:port",
    };

    if ip
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '/' | '?' | '#' | '@' | '\\'))
    {
        return Err(invalid);
    }

    let url = Url::parse(&format!("http://{ip}/")).map_err(|_| invalid.clone())?;
    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(()),
        _ => Err(invalid),
    }
}

#[derive(Clone)]
pub struct RaspberryAdapter {
    client: Client,
    api_key: Secret<String>,
    policy: RetryPolicy,
}

impl RaspberryAdapter {
    pub fn new(client: Client, api_key: Secret<String>, policy: RetryPolicy) -> Self {
        Self {
            client,
            api_key,
            policy,
        }
    }

    pub async fn execute(
        &self,
        action: Action,
        config: &RaspberryConfig,
    ) -> Result<Value, AdapterError> {
        let kind = LockKind::Raspberry;
        info!(%kind, %action, ip = %config.ip, pin = "****", "Calling lock controller");

        let delivery = send_with_retry(&self.policy, kind, action, || self.request(action, config))
            .await
            .map_err(|exhausted| {
                warn!(
                    %kind,
                    %action,
                    ip = %config.ip,
                    attempts = exhausted.attempts,
                    error = %exhausted.error,
                    "Lock controller unreachable"
                );
                AdapterError::Unreachable {
                    kind,
                    action,
                    attempts: exhausted.attempts,
                    cause: exhausted.error.to_string(),
                }
            })?;

        let status = delivery.response.status();
        if !status.is_success() {
            warn!(%kind, %action, ip = %config.ip, status = status.as_u16(), "Lock controller rejected request");
            return Err(AdapterError::Rejected {
                kind,
                action,
                status: status.as_u16(),
            });
        }

        let body = delivery
            .response
            .text()
            .await
            .map_err(|e| AdapterError::InvalidResponse {
                kind,
                action,
                cause: e.without_url().to_string(),
            })?;

        info!(%kind, %action, attempts = delivery.attempts, "Lock controller responded");
        Ok(opaque_body(body))
    }

    fn request(&self, action: Action, config: &RaspberryConfig) -> RequestBuilder {
        let builder = match action {
            Action::Open => self
                .client
                .post(config.endpoint("open"))
                .json(&json!({ "pin": config.pin })),
            Action::Lock => self
                .client
                .post(config.endpoint("lock"))
                .json(&json!({ "pin": config.pin })),
            Action::Status => self
                .client
                .get(config.endpoint("status"))
                .query(&[("pin", config.pin)]),
        };
        builder.header(API_KEY_HEADER, self.api_key.expose_secret())
    }
}
