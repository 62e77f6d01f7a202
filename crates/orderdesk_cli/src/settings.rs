//! Process configuration loaded from environment variables.
//!
//! `.env` files are honoured through `dotenvy` before lookup.

use orderdesk_core::{default_log_level, RetryPolicy};
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

pub const ENV_DB: &str = "ORDERDESK_DB";
pub const ENV_DB_RETRIES: &str = "ORDERDESK_DB_RETRIES";
pub const ENV_DB_RETRY_DELAY_SECS: &str = "ORDERDESK_DB_RETRY_DELAY_SECS";
pub const ENV_SECRET: &str = "ORDERDESK_SECRET";
pub const ENV_PORT: &str = "ORDERDESK_PORT";
pub const ENV_BIND: &str = "ORDERDESK_BIND";
pub const ENV_LOG_LEVEL: &str = "ORDERDESK_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "ORDERDESK_LOG_DIR";

const DEFAULT_DB: &str = "sqlite://orderdesk.sqlite3";
const DEFAULT_DB_RETRIES: u32 = 5;
const DEFAULT_DB_RETRY_DELAY_SECS: u64 = 5;
const DEFAULT_PORT: u16 = 4000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value `{value}` for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Resolved process settings.
#[derive(Clone)]
pub struct Settings {
    pub db_locator: String,
    pub db_retries: u32,
    pub db_retry_delay_secs: u64,
    pub secret: Option<String>,
    pub port: u16,
    pub bind_addr: IpAddr,
    pub log_level: String,
    pub log_dir: Option<String>,
}

impl Settings {
    /// Loads settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads settings through `lookup`; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        Ok(Self {
            db_locator: get(ENV_DB).unwrap_or_else(|| DEFAULT_DB.to_string()),
            db_retries: parse_or(ENV_DB_RETRIES, get(ENV_DB_RETRIES), DEFAULT_DB_RETRIES)?,
            db_retry_delay_secs: parse_or(
                ENV_DB_RETRY_DELAY_SECS,
                get(ENV_DB_RETRY_DELAY_SECS),
                DEFAULT_DB_RETRY_DELAY_SECS,
            )?,
            secret: get(ENV_SECRET),
            port: parse_or(ENV_PORT, get(ENV_PORT), DEFAULT_PORT)?,
            bind_addr: parse_or(ENV_BIND, get(ENV_BIND), IpAddr::V4(Ipv4Addr::UNSPECIFIED))?,
            log_level: get(ENV_LOG_LEVEL).unwrap_or_else(|| default_log_level().to_string()),
            log_dir: get(ENV_LOG_DIR),
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from_secs(self.db_retries, self.db_retry_delay_secs)
    }
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("db_locator", &self.db_locator)
            .field("db_retries", &self.db_retries)
            .field("db_retry_delay_secs", &self.db_retry_delay_secs)
            .field("secret", &self.secret.as_ref().map(|_| "[REDACTED]"))
            .field("port", &self.port)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("log_dir", &self.log_dir)
            .finish()
    }
}

fn parse_or<T>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => value.parse().map_err(|err: T::Err| ConfigError::InvalidValue {
            key,
            reason: err.to_string(),
            value,
        }),
    }
}
