//! Send pipeline: one user message in, a persisted reply (or apology) out.
//!
//! DESIGN
//! ======
//! A send runs four stages strictly in order:
//!
//! 1. persist the user message
//! 2. touch the chat's `updated_at` (best effort)
//! 3. ask the responder for a reply
//! 4. persist the bot reply, then touch again (best effort)
//!
//! Each failure is absorbed at a fixed point. Stage 1 failing falls to the
//! last-resort apology. Stage 3 or 4 failing falls to the connection
//! apology. Touch failures are logged and ignored. Nothing escapes
//! `run_send`; it always returns a `SendOutcome`.
//!
//! SINGLE FLIGHT
//! =============
//! `SendGuard` belongs to one chat view (one socket). `begin_send` checks
//! and sets it synchronously before any remote call; a second send while
//! one is running is rejected, never queued. The `SendPermit` it hands out
//! resets the guard to `Idle` when dropped, whichever path the run takes.
//! Sends from other sockets are not coordinated.

use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::responder::{ReplyExtraction, Responder, WebhookRequest};
use crate::services::store::{ChatStore, StoreError};
use crate::state::{Message, NewMessage};

// =============================================================================
// FIXED REPLIES
// =============================================================================

/// Bot reply stored when the responder cannot be reached or its reply
/// cannot be saved.
pub const CONNECTION_FALLBACK_REPLY: &str =
    "I'm sorry, I'm having trouble connecting to my AI service right now. Please try again in a moment.";

/// Bot reply stored when the user message itself could not be saved.
pub const LAST_RESORT_REPLY: &str = "I'm sorry, I'm having trouble responding right now. Please try again in a moment.";

/// Bot reply used when the responder answers in a shape we do not recognize.
pub const UNRECOGNIZED_REPLY_PLACEHOLDER: &str = "I received your message but had trouble generating a response.";

pub const MISSING_IDENTITY_MESSAGE: &str =
    "Authentication error: User ID missing. Please refresh the page and try again.";

const PREVIEW_CHARS: usize = 100;

// =============================================================================
// STATE
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SendStage {
    UserMessage,
    ChatTouch,
    WebhookCall,
    BotMessage,
    FallbackMessage,
    LastResortMessage,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SendState {
    #[default]
    Idle,
    Sending(SendStage),
}

/// Per-view single-flight gate. Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct SendGuard {
    state: Arc<Mutex<SendState>>,
}

impl SendGuard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> SendState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim the guard if idle. The returned permit releases it on drop.
    #[must_use]
    pub fn try_begin(&self) -> Option<SendPermit> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state != SendState::Idle {
            return None;
        }
        *state = SendState::Sending(SendStage::UserMessage);
        Some(SendPermit { state: Arc::clone(&self.state) })
    }
}

/// Proof that a send is in flight. Dropping it returns the guard to `Idle`.
#[derive(Debug)]
pub struct SendPermit {
    state: Arc<Mutex<SendState>>,
}

impl SendPermit {
    pub fn advance(&self, stage: SendStage) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = SendState::Sending(stage);
    }
}

impl Drop for SendPermit {
    fn drop(&mut self) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = SendState::Idle;
    }
}

// =============================================================================
// PRECONDITIONS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SendRejected {
    #[error("message is empty")]
    EmptyContent,
    #[error("no chat selected")]
    NoChatSelected,
    #[error("a message is already being sent")]
    InFlight,
    #[error("{}", MISSING_IDENTITY_MESSAGE)]
    MissingIdentity,
}

impl crate::frame::ErrorCode for SendRejected {
    fn error_code(&self) -> &'static str {
        match self {
            Self::EmptyContent => "E_EMPTY_MESSAGE",
            Self::NoChatSelected => "E_NO_CHAT_SELECTED",
            Self::InFlight => "E_SEND_IN_FLIGHT",
            Self::MissingIdentity => "E_MISSING_IDENTITY",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::InFlight)
    }
}

/// A validated send, ready for `run_send`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendRequest {
    pub chat_id: Uuid,
    pub user_id: Uuid,
    /// Trimmed user input.
    pub content: String,
}

/// Validate a send and claim the guard.
///
/// Checks run in order: content, chat, in-flight, identity. No remote call
/// happens here.
///
/// # Errors
///
/// Returns the first [`SendRejected`] that applies. The guard is left as it
/// was.
pub fn begin_send(
    guard: &SendGuard,
    chat_id: Option<Uuid>,
    user_id: Option<Uuid>,
    content: &str,
) -> Result<(SendPermit, SendRequest), SendRejected> {
    let content = content.trim();
    if content.is_empty() {
        return Err(SendRejected::EmptyContent);
    }
    let Some(chat_id) = chat_id else {
        return Err(SendRejected::NoChatSelected);
    };
    let Some(permit) = guard.try_begin() else {
        return Err(SendRejected::InFlight);
    };
    let Some(user_id) = user_id else {
        drop(permit);
        error!(%chat_id, "send: no user id available");
        return Err(SendRejected::MissingIdentity);
    };
    Ok((permit, SendRequest { chat_id, user_id, content: content.to_string() }))
}

// =============================================================================
// OUTCOME
// =============================================================================

/// Every end state a send can reach.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SendOutcome {
    /// User message and real bot reply persisted.
    Replied { user_message: Message, bot_message: Message },
    /// User message and connection apology persisted.
    FallbackReply { user_message: Message, bot_message: Message },
    /// User message persisted; the apology insert failed too.
    UserOnly { user_message: Message },
    /// User message failed; last-resort apology persisted.
    LastResort { bot_message: Message },
    /// Nothing persisted.
    Nothing,
}

impl SendOutcome {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Replied { .. } => "replied",
            Self::FallbackReply { .. } => "fallback_reply",
            Self::UserOnly { .. } => "user_only",
            Self::LastResort { .. } => "last_resort",
            Self::Nothing => "nothing",
        }
    }

    /// Messages this send persisted, in write order.
    #[must_use]
    pub fn persisted(&self) -> Vec<&Message> {
        match self {
            Self::Replied { user_message, bot_message } | Self::FallbackReply { user_message, bot_message } => {
                vec![user_message, bot_message]
            }
            Self::UserOnly { user_message } => vec![user_message],
            Self::LastResort { bot_message } => vec![bot_message],
            Self::Nothing => Vec::new(),
        }
    }
}

// =============================================================================
// RUN
// =============================================================================

/// Run all stages for an accepted send. Never fails; the permit is released
/// when this returns.
pub async fn run_send(
    store: &dyn ChatStore,
    responder: &dyn Responder,
    permit: SendPermit,
    request: SendRequest,
) -> SendOutcome {
    info!(
        chat_id = %request.chat_id,
        user_id = %request.user_id,
        content_len = request.content.len(),
        preview = %preview(&request.content),
        "send: start"
    );

    let outcome = match deliver(store, responder, &permit, &request).await {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!(chat_id = %request.chat_id, stage = "user_message", error = %e, "send: user message not saved");
            last_resort(store, &permit, &request).await
        }
    };

    info!(chat_id = %request.chat_id, outcome = outcome.kind(), "send: finished");
    outcome
}

/// Stages 1 through 4. Only a stage-1 failure escapes as `Err`.
async fn deliver(
    store: &dyn ChatStore,
    responder: &dyn Responder,
    permit: &SendPermit,
    request: &SendRequest,
) -> Result<SendOutcome, StoreError> {
    permit.advance(SendStage::UserMessage);
    let user_message = store
        .insert_message(NewMessage::user(request.chat_id, request.user_id, &request.content))
        .await?;

    permit.advance(SendStage::ChatTouch);
    touch(store, request.chat_id, SendStage::ChatTouch).await;

    permit.advance(SendStage::WebhookCall);
    let call = WebhookRequest { message: request.content.clone(), chat_id: request.chat_id, user_id: request.user_id };
    let reply = match responder.respond(&call).await {
        Ok(extraction) => {
            if extraction == ReplyExtraction::Unrecognized {
                warn!(chat_id = %request.chat_id, "send: unrecognized responder reply, using placeholder");
            }
            extraction.into_text_or(UNRECOGNIZED_REPLY_PLACEHOLDER)
        }
        Err(e) => {
            warn!(chat_id = %request.chat_id, stage = "webhook_call", error = %e, "send: responder failed");
            return Ok(fallback(store, permit, request, user_message).await);
        }
    };

    permit.advance(SendStage::BotMessage);
    match store
        .insert_message(NewMessage::bot(request.chat_id, request.user_id, reply))
        .await
    {
        Ok(bot_message) => {
            touch(store, request.chat_id, SendStage::BotMessage).await;
            Ok(SendOutcome::Replied { user_message, bot_message })
        }
        Err(e) => {
            warn!(chat_id = %request.chat_id, stage = "bot_message", error = %e, "send: bot reply not saved");
            Ok(fallback(store, permit, request, user_message).await)
        }
    }
}

async fn fallback(
    store: &dyn ChatStore,
    permit: &SendPermit,
    request: &SendRequest,
    user_message: Message,
) -> SendOutcome {
    permit.advance(SendStage::FallbackMessage);
    match store
        .insert_message(NewMessage::bot(request.chat_id, request.user_id, CONNECTION_FALLBACK_REPLY))
        .await
    {
        Ok(bot_message) => {
            touch(store, request.chat_id, SendStage::FallbackMessage).await;
            SendOutcome::FallbackReply { user_message, bot_message }
        }
        Err(e) => {
            error!(chat_id = %request.chat_id, stage = "fallback_message", error = %e, "send: fallback reply not saved");
            SendOutcome::UserOnly { user_message }
        }
    }
}

async fn last_resort(store: &dyn ChatStore, permit: &SendPermit, request: &SendRequest) -> SendOutcome {
    permit.advance(SendStage::LastResortMessage);
    match store
        .insert_message(NewMessage::bot(request.chat_id, request.user_id, LAST_RESORT_REPLY))
        .await
    {
        Ok(bot_message) => SendOutcome::LastResort { bot_message },
        Err(e) => {
            error!(
                chat_id = %request.chat_id,
                stage = "last_resort_message",
                error = %e,
                "send: last-resort reply not saved"
            );
            SendOutcome::Nothing
        }
    }
}

async fn touch(store: &dyn ChatStore, chat_id: Uuid, after: SendStage) {
    if let Err(e) = store.touch_chat(chat_id).await {
        warn!(%chat_id, after = ?after, error = %e, "send: chat touch failed, continuing");
    }
}

fn preview(content: &str) -> String {
    let mut out: String = content.chars().take(PREVIEW_CHARS).collect();
    if content.chars().count() > PREVIEW_CHARS {
        out.push_str("...");
    }
    out
}

#[cfg(test)]
#[path = "pipeline_test.rs"]
mod tests;
