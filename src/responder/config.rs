//! Webhook configuration parsed from environment variables.

use crate::config::{ConfigError, env_parse};

pub const DEFAULT_WEBHOOK_CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookConfig {
    pub url: String,
    /// Overall request timeout. `None` leaves the call bounded only by the transport.
    pub request_timeout_secs: Option<u64>,
    pub connect_timeout_secs: u64,
}

impl WebhookConfig {
    /// Build typed webhook config from environment variables.
    ///
    /// Required:
    /// - `WEBHOOK_URL`
    ///
    /// Optional:
    /// - `WEBHOOK_REQUEST_TIMEOUT_SECS`: unset by default
    /// - `WEBHOOK_CONNECT_TIMEOUT_SECS`: default 10
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if `WEBHOOK_URL` is missing or is not an
    /// http(s) URL.
    pub fn from_env() -> Result<Self, ConfigError> {
        let url = std::env::var("WEBHOOK_URL").map_err(|_| ConfigError::Missing { var: "WEBHOOK_URL" })?;
        let url = url.trim().to_string();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::Invalid { var: "WEBHOOK_URL", reason: format!("not an http(s) url: {url}") });
        }

        let request_timeout_secs = std::env::var("WEBHOOK_REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0);

        Ok(Self {
            url,
            request_timeout_secs,
            connect_timeout_secs: env_parse("WEBHOOK_CONNECT_TIMEOUT_SECS", DEFAULT_WEBHOOK_CONNECT_TIMEOUT_SECS),
        })
    }
}
