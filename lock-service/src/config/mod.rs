use anyhow::{Context, Result};
use dotenvy::dotenv;
use secrecy::Secret;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::adapters::avior::DEFAULT_BASE_URL;

#[derive(Clone, Debug)]
pub struct LockServiceConfig {
    /// Port, log level and OTLP endpoint shared by every service.
    pub app: service_core::config::Config,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub raspberry: RaspberryConfig,
    pub mobikey: MobikeyConfig,
    pub audit: AuditConfig,
    /// Browser origins allowed by CORS. Empty disables cross-origin access.
    pub allowed_origins: Vec<String>,
    pub service_name: String,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    pub max_connections: u32,
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: Secret<String>,
}

#[derive(Clone, Debug)]
pub struct RaspberryConfig {
    pub api_key: Secret<String>,
    pub timeout: Duration,
    pub retry_delay: Duration,
}

#[derive(Clone, Debug)]
pub struct MobikeyConfig {
    pub base_url: String,
    pub timeout: Duration,
}

#[derive(Clone, Debug)]
pub struct AuditConfig {
    pub write_timeout: Duration,
}

impl LockServiceConfig {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let app = service_core::config::Config::load().context("failed to load APP__* settings")?;

        Ok(Self {
            app,
            database: DatabaseConfig {
                url: Secret::new(required("LOCK_DATABASE_URL")?),
                max_connections: parsed_or("LOCK_DATABASE_MAX_CONNECTIONS", 5)?,
            },
            auth: AuthConfig {
                jwt_secret: Secret::new(required("JWT_SECRET")?),
            },
            raspberry: RaspberryConfig {
                api_key: Secret::new(required("PI_API_KEY")?),
                timeout: Duration::from_millis(parsed_or("RASPBERRY_TIMEOUT_MS", 4000)?),
                retry_delay: Duration::from_millis(parsed_or("RASPBERRY_RETRY_DELAY_MS", 3000)?),
            },
            mobikey: MobikeyConfig {
                base_url: env::var("MOBIKEY_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
                timeout: Duration::from_millis(parsed_or("MOBIKEY_TIMEOUT_MS", 10_000)?),
            },
            audit: AuditConfig {
                write_timeout: Duration::from_millis(parsed_or("AUDIT_WRITE_TIMEOUT_MS", 2000)?),
            },
            allowed_origins: split_list(&env::var("CORS_ALLOWED_ORIGINS").unwrap_or_default()),
            service_name: "lock-service".to_string(),
        })
    }
}

fn required(name: &str) -> Result<String> {
    env::var(name).with_context(|| format!("{name} must be set"))
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parsed_or<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{name} has an invalid value")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parsed_or_falls_back_when_unset() {
        let value: u64 = parsed_or("LOCK_SERVICE_TEST_UNSET_VARIABLE", 42).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn origin_list_skips_blanks() {
        assert_eq!(
            split_list(" http://a.example , ,http://b.example"),
            vec!["http://a.example".to_string(), "http://b.example".to_string()]
        );
        assert!(split_list("").is_empty());
    }

    #[test]
    fn required_names_the_missing_variable() {
        let err = required("LOCK_SERVICE_TEST_MISSING_VARIABLE").unwrap_err();
        assert!(err.to_string().contains("LOCK_SERVICE_TEST_MISSING_VARIABLE"));
    }
}
