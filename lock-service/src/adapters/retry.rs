//! Retry policy for device requests.
//!
//! Only requests that produced no response at all (connect failure, reset,
//! per-attempt timeout) are retried. Any HTTP status, including 5xx, is a
//! response and ends the loop.

use super::LockKind;
use crate::models::Action;
use crate::services::metrics;
use reqwest::{RequestBuilder, Response};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Fixed pause between attempts.
    pub retry_delay: Duration,
    /// Upper bound for each single attempt.
    pub attempt_timeout: Duration,
}

impl RetryPolicy {
    /// Policy for devices on the local network: one retry after 3s, 4s per attempt.
    pub fn device_local() -> Self {
        Self {
            max_retries: 1,
            retry_delay: Duration::from_secs(3),
            attempt_timeout: Duration::from_secs(4),
        }
    }

    /// Single attempt bounded by `timeout`.
    pub fn single_attempt(timeout: Duration) -> Self {
        Self {
            max_retries: 0,
            retry_delay: Duration::ZERO,
            attempt_timeout: timeout,
        }
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn with_attempt_timeout(mut self, attempt_timeout: Duration) -> Self {
        self.attempt_timeout = attempt_timeout;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }
}

/// A response was received.
#[derive(Debug)]
pub struct Delivery {
    pub response: Response,
    pub attempts: u32,
}

/// No response was received within the policy.
#[derive(Debug)]
pub struct Exhausted {
    pub attempts: u32,
    /// Stripped of its URL, which may embed credentials.
    pub error: reqwest::Error,
}

/// Send the request produced by `build` under `policy`.
///
/// `build` is called once per attempt since a `RequestBuilder` is consumed
/// by `send`.
pub async fn send_with_retry<F>(
    policy: &RetryPolicy,
    kind: LockKind,
    action: Action,
    mut build: F,
) -> Result<Delivery, Exhausted>
where
    F: FnMut() -> RequestBuilder,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        debug!(%kind, %action, attempt, "Sending device request");

        match build().timeout(policy.attempt_timeout).send().await {
            Ok(response) => {
                metrics::record_adapter_attempt(kind, "response");
                return Ok(Delivery {
                    response,
                    attempts: attempt,
                });
            }
            Err(err) => {
                let err = err.without_url();
                metrics::record_adapter_attempt(kind, "no_response");

                // A builder error will fail identically on every attempt.
                if err.is_builder() || attempt >= policy.max_attempts() {
                    return Err(Exhausted {
                        attempts: attempt,
                        error: err,
                    });
                }

                warn!(
                    %kind,
                    %action,
                    attempt,
                    timed_out = err.is_timeout(),
                    delay_ms = policy.retry_delay.as_millis() as u64,
                    "Device did not respond, retrying"
                );
                sleep(policy.retry_delay).await;
            }
        }
    }
}
