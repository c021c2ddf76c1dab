//! Webhook client for the AI responder.
//!
//! Thin HTTP wrapper: POST the JSON request, classify the status, and hand
//! the body to `reply` for decoding. Pure parsing lives in `reply` for
//! testability.

use std::time::Duration;

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use tracing::{debug, info};

use super::config::WebhookConfig;
use super::reply::{extract_reply, parse_reply_body};
use super::types::{ReplyExtraction, Responder, ResponderError, WebhookRequest};

// =============================================================================
// CLIENT
// =============================================================================

pub struct WebhookClient {
    http: reqwest::Client,
    url: String,
}

impl WebhookClient {
    /// Build a client from typed webhook config.
    ///
    /// # Errors
    ///
    /// Returns [`ResponderError::HttpClientBuild`] if reqwest rejects the
    /// client configuration.
    pub fn new(config: &WebhookConfig) -> Result<Self, ResponderError> {
        let mut builder = reqwest::Client::builder().connect_timeout(Duration::from_secs(config.connect_timeout_secs));
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http = builder
            .build()
            .map_err(|e| ResponderError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, url: config.url.clone() })
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn post(&self, request: &WebhookRequest) -> Result<ReplyExtraction, ResponderError> {
        let response = self
            .http
            .post(&self.url)
            .header(ACCEPT, "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| ResponderError::Request(e.to_string()))?;

        let status = response.status();
        info!(chat_id = %request.chat_id, status = status.as_u16(), "webhook: response status");

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        let text = response
            .text()
            .await
            .map_err(|e| ResponderError::Request(e.to_string()))?;

        if !status.is_success() {
            return Err(ResponderError::Status { status: status.as_u16(), body: text });
        }

        decode_success_body(content_type.as_deref(), &text)
    }
}

#[async_trait::async_trait]
impl Responder for WebhookClient {
    async fn respond(&self, request: &WebhookRequest) -> Result<ReplyExtraction, ResponderError> {
        self.post(request).await
    }
}

// =============================================================================
// PARSING
// =============================================================================

fn decode_success_body(content_type: Option<&str>, text: &str) -> Result<ReplyExtraction, ResponderError> {
    if text.trim().is_empty() {
        return Err(ResponderError::EmptyBody);
    }

    let value = parse_reply_body(content_type, text);
    let extraction = extract_reply(&value);
    debug!(
        content_type = content_type.unwrap_or("-"),
        recognized = matches!(extraction, ReplyExtraction::Reply(_)),
        "webhook: body decoded"
    );
    Ok(extraction)
}

#[cfg(test)]
#[path = "webhook_test.rs"]
mod tests;
