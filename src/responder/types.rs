//! Responder types: the webhook request and what came back.

use serde::Serialize;
use uuid::Uuid;

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced while calling the AI responder webhook.
#[derive(Debug, thiserror::Error)]
pub enum ResponderError {
    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),

    /// The request never produced a response (connect, timeout, read).
    #[error("webhook request failed: {0}")]
    Request(String),

    /// The webhook answered with a non-2xx status.
    #[error("webhook responded with status: {status}")]
    Status { status: u16, body: String },

    /// The webhook answered 2xx with nothing in the body.
    #[error("webhook returned an empty body")]
    EmptyBody,
}

impl crate::frame::ErrorCode for ResponderError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
            Self::Request(_) => "E_WEBHOOK_REQUEST",
            Self::Status { .. } => "E_WEBHOOK_STATUS",
            Self::EmptyBody => "E_WEBHOOK_EMPTY_BODY",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Request(_) | Self::Status { status: 429 | 500..=599, .. })
    }
}

// =============================================================================
// REQUEST / RESULT
// =============================================================================

/// JSON body posted to the webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebhookRequest {
    pub message: String,
    pub chat_id: Uuid,
    pub user_id: Uuid,
}

/// Outcome of probing a successful webhook body for reply text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyExtraction {
    /// A non-empty reply was found in one of the known fields.
    Reply(String),
    /// The body parsed but carried no recognizable reply field.
    Unrecognized,
}

impl ReplyExtraction {
    /// Reply text, or `placeholder` when the body shape was not recognized.
    #[must_use]
    pub fn into_text_or(self, placeholder: &str) -> String {
        match self {
            Self::Reply(text) => text,
            Self::Unrecognized => placeholder.to_string(),
        }
    }
}

// =============================================================================
// RESPONDER TRAIT
// =============================================================================

/// Async seam in front of the AI responder. Enables mocking in tests.
#[async_trait::async_trait]
pub trait Responder: Send + Sync {
    /// Send one user message to the responder and extract its reply.
    ///
    /// # Errors
    ///
    /// Returns a [`ResponderError`] on transport failure, non-2xx status, or
    /// an empty body.
    async fn respond(&self, request: &WebhookRequest) -> Result<ReplyExtraction, ResponderError>;
}
