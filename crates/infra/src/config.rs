//! Configuration loading and representation.
//!
//! Values come from the process environment; a `.env` file is loaded first
//! when present. Tests go through [`AppConfig::from_lookup`] instead of
//! touching the real environment.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use tenantgate_auth::{ReplayPolicy, TokenConfig};
use tenantgate_core::{Classify, ErrorKind, UserId};

/// HS256 secrets shorter than this are refused at startup.
pub const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is required but not set")]
    Missing(&'static str),

    #[error("{key} is invalid: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("{0} must be at least 32 bytes")]
    WeakSecret(&'static str),
}

impl Classify for ConfigError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Configuration
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub http_addr: SocketAddr,
    /// Unset means in-memory credential storage (dev only).
    pub redis_url: Option<String>,
    /// Unset means in-memory policy storage (dev only).
    pub database_url: Option<String>,
    pub tokens: TokenConfig,
    pub log_format: String,
    /// User granted `super_admin` in the default domain at startup.
    pub bootstrap_admin: Option<UserId>,
}

impl AppConfig {
    pub const DEFAULT_HTTP_ADDR: &'static str = "0.0.0.0:8080";

    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env is normal outside local development.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let http_addr = parse(
            "HTTP_ADDR",
            get("HTTP_ADDR").unwrap_or_else(|| Self::DEFAULT_HTTP_ADDR.to_string()),
        )?;

        let access_secret = secret("JWT_ACCESS_SECRET", get("JWT_ACCESS_SECRET"))?;
        let refresh_secret = secret("JWT_REFRESH_SECRET", get("JWT_REFRESH_SECRET"))?;
        if access_secret == refresh_secret {
            return Err(ConfigError::Invalid {
                key: "JWT_REFRESH_SECRET",
                reason: "must differ from JWT_ACCESS_SECRET".into(),
            });
        }

        let mut tokens = TokenConfig::new(access_secret, refresh_secret);
        if let Some(v) = get("JWT_ACCESS_TTL_SECS") {
            tokens.access_ttl = Duration::from_secs(positive("JWT_ACCESS_TTL_SECS", v)?);
        }
        if let Some(v) = get("JWT_REFRESH_TTL_SECS") {
            tokens.refresh_ttl = Duration::from_secs(positive("JWT_REFRESH_TTL_SECS", v)?);
        }
        if tokens.refresh_ttl <= tokens.access_ttl {
            return Err(ConfigError::Invalid {
                key: "JWT_REFRESH_TTL_SECS",
                reason: "must exceed the access token lifetime".into(),
            });
        }
        tokens.issuer = get("JWT_ISSUER");
        if let Some(v) = get("JWT_LEEWAY_SECS") {
            tokens.leeway = Duration::from_secs(parse("JWT_LEEWAY_SECS", v)?);
        }
        if let Some(v) = get("STORE_TIMEOUT_MS") {
            tokens.store_timeout = Duration::from_millis(positive("STORE_TIMEOUT_MS", v)?);
        }
        if let Some(v) = get("REPLAY_POLICY") {
            tokens.replay_policy = v
                .parse::<ReplayPolicy>()
                .map_err(|reason| ConfigError::Invalid { key: "REPLAY_POLICY", reason })?;
        }

        Ok(Self {
            http_addr,
            redis_url: get("REDIS_URL"),
            database_url: get("DATABASE_URL"),
            tokens,
            log_format: get("LOG_FORMAT").unwrap_or_else(|| "json".to_string()),
            bootstrap_admin: get("BOOTSTRAP_SUPER_ADMIN").map(UserId::from),
        })
    }
}

fn parse<T>(key: &'static str, raw: String) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        reason: e.to_string(),
    })
}

fn positive(key: &'static str, raw: String) -> Result<u64, ConfigError> {
    match parse::<u64>(key, raw)? {
        0 => Err(ConfigError::Invalid {
            key,
            reason: "must be greater than zero".into(),
        }),
        n => Ok(n),
    }
}

fn secret(key: &'static str, value: Option<String>) -> Result<String, ConfigError> {
    let value = value.ok_or(ConfigError::Missing(key))?;
    if value.len() < MIN_SECRET_LEN {
        return Err(ConfigError::WeakSecret(key));
    }
    Ok(value)
}
