//! Avior locks driven through the Mobikey cloud relay.
//!
//! Commands go to `{base}/cmd/J/{device}/pwd/{password}`: `OUT{n}=1` opens,
//! `OUT{n}=0` locks and a plain `GET` reads the state. The password is part
//! of the URL, so URLs are never logged and errors are stripped of them.

use super::retry::{send_with_retry, RetryPolicy};
use super::{opaque_body, required_uint, required_verbatim, AdapterError, ConfigurationError, LockKind};
use crate::models::Action;
use anyhow::{bail, Result};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder, Url};
use secrecy::{ExposeSecret, Secret};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_BASE_URL: &str = "http://www.mobikey.eu";

#[derive(Debug, Clone)]
pub struct AviorConfig {
    pub device: String,
    pub password: Secret<String>,
    /// Relay output wired to the lock, starting at 1.
    pub out: u32,
}

impl AviorConfig {
    pub(crate) fn from_fields(fields: &Map<String, Value>) -> Result<Self, ConfigurationError> {
        let device = required_verbatim(fields, "device")?;
        let password = Secret::new(required_verbatim(fields, "password")?);
        let out = required_uint(fields, "out")?;
        let out = u32::try_from(out)
            .ok()
            .filter(|out| *out >= 1)
            .ok_or(ConfigurationError::InvalidField {
                field: "out",
                reason: "expected an output number of at least 1",
            })?;
        Ok(Self {
            device,
            password,
            out,
        })
    }

    /// Text body the relay expects for a state change.
    pub fn command_body(&self, action: Action) -> Option<String> {
        match action {
            Action::Open => Some(format!("OUT{}=1", self.out)),
            Action::Lock => Some(format!("OUT{}=0", self.out)),
            Action::Status => None,
        }
    }
}

#[derive(Clone)]
pub struct AviorAdapter {
    client: Client,
    base_url: Url,
    policy: RetryPolicy,
}

impl AviorAdapter {
    pub fn new(client: Client, base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            bail!("Mobikey base URL cannot carry a path: {base_url}");
        }
        Ok(Self {
            client,
            base_url,
            policy: RetryPolicy::single_attempt(timeout),
        })
    }

    pub async fn execute(&self, action: Action, config: &AviorConfig) -> Result<Value, AdapterError> {
        let kind = LockKind::Avior;
        info!(%kind, %action, device = %config.device, out = config.out, "Calling Mobikey relay");

        let delivery = send_with_retry(&self.policy, kind, action, || self.request(action, config))
            .await
            .map_err(|exhausted| {
                warn!(
                    %kind,
                    %action,
                    device = %config.device,
                    error = %exhausted.error,
                    "Mobikey relay unreachable"
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
            warn!(%kind, %action, device = %config.device, status = status.as_u16(), "Mobikey relay rejected request");
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

        info!(%kind, %action, device = %config.device, "Mobikey relay responded");
        Ok(opaque_body(body))
    }

    fn command_url(&self, config: &AviorConfig) -> Url {
        let mut url = self.base_url.clone();
        // Checked in `new`: the base URL always accepts path segments.
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend([
                "cmd",
                "J",
                config.device.as_str(),
                "pwd",
                config.password.expose_secret().as_str(),
            ]);
        }
        url
    }

    fn request(&self, action: Action, config: &AviorConfig) -> RequestBuilder {
        let url = self.command_url(config);
        match config.command_body(action) {
            Some(body) => self
                .client
                .post(url)
                .header(CONTENT_TYPE, "text/plain")
                .body(body),
            None => self.client.get(url),
        }
    }
}
