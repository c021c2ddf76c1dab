//! Service configuration parsed from environment variables.
//!
//! Numeric knobs fall back to their defaults when unset or unparseable;
//! only genuinely required values (`DATABASE_URL`, `WEBHOOK_URL`) fail.

use axum::http::HeaderName;

use crate::responder::config::WebhookConfig;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_IDENTITY_HEADER: &str = "x-user-id";
pub const DEFAULT_DEDUP_WINDOW_MS: i64 = 60_000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is not set.
    #[error("missing required env var {var}")]
    Missing { var: &'static str },

    /// A value is present but unusable.
    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    pub db_max_connections: u32,
    /// Header the upstream identity provider uses to pass the caller's user id.
    pub identity_header: HeaderName,
    pub dedup_window_ms: i64,
    pub webhook: WebhookConfig,
}

impl AppConfig {
    /// Build typed config from environment variables.
    ///
    /// Required:
    /// - `DATABASE_URL`
    /// - `WEBHOOK_URL`
    ///
    /// Optional:
    /// - `PORT`: default 3000
    /// - `DB_MAX_CONNECTIONS`: default 5
    /// - `IDENTITY_HEADER`: default `x-user-id`
    /// - `DEDUP_WINDOW_MS`: default 60000
    /// - `WEBHOOK_REQUEST_TIMEOUT_SECS`, `WEBHOOK_CONNECT_TIMEOUT_SECS`
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if a required variable is missing or the
    /// identity header name is not a valid HTTP header.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = std::env::var("DATABASE_URL").map_err(|_| ConfigError::Missing { var: "DATABASE_URL" })?;
        let identity_header = parse_header_name(std::env::var("IDENTITY_HEADER").ok().as_deref())?;
        let webhook = WebhookConfig::from_env()?;

        Ok(Self {
            database_url,
            port: env_parse("PORT", DEFAULT_PORT),
            db_max_connections: env_parse("DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS),
            identity_header,
            dedup_window_ms: env_parse("DEDUP_WINDOW_MS", DEFAULT_DEDUP_WINDOW_MS).max(0),
            webhook,
        })
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn parse_header_name(raw: Option<&str>) -> Result<HeaderName, ConfigError> {
    let raw = raw.unwrap_or(DEFAULT_IDENTITY_HEADER).trim();
    HeaderName::from_bytes(raw.as_bytes())
        .map_err(|e| ConfigError::Invalid { var: "IDENTITY_HEADER", reason: e.to_string() })
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
