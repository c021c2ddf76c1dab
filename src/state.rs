//! Shared application state and chat domain types.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! holds the collaborators behind trait objects (`ChatStore`, `Responder`)
//! so handlers and the send pipeline never know whether they talk to
//! Postgres and a real webhook or to the in-memory doubles used in tests.
//!
//! Messages are immutable once created. Timestamps are integer milliseconds
//! since the Unix epoch on every type that crosses the store boundary.

use std::sync::Arc;

use axum::http::HeaderName;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::responder::Responder;
use crate::services::live::LiveHub;
use crate::services::store::ChatStore;

// =============================================================================
// MESSAGES
// =============================================================================

/// Author side of a message, derived from `is_bot`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Bot,
    User,
}

/// A persisted chat message. Mirrors the `messages` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub is_bot: bool,
    pub created_at: i64,
}

impl Message {
    #[must_use]
    pub fn role(&self) -> Role {
        if self.is_bot { Role::Bot } else { Role::User }
    }
}

/// Insert payload for `ChatStore::insert_message`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub chat_id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub is_bot: bool,
}

impl NewMessage {
    #[must_use]
    pub fn user(chat_id: Uuid, user_id: Uuid, content: impl Into<String>) -> Self {
        Self { chat_id, user_id, content: content.into(), is_bot: false }
    }

    /// Bot replies carry the id of the user they answer.
    #[must_use]
    pub fn bot(chat_id: Uuid, user_id: Uuid, content: impl Into<String>) -> Self {
        Self { chat_id, user_id, content: content.into(), is_bot: true }
    }
}

// =============================================================================
// CHATS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Denormalized preview of a chat's newest message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastMessage {
    pub content: String,
    pub created_at: i64,
}

/// Chat list row: the chat plus its most recent message, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSummary {
    #[serde(flatten)]
    pub chat: Chat,
    pub last_message: Option<LastMessage>,
}

/// Result of refreshing a chat's `updated_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChatTouch {
    pub id: Uuid,
    pub updated_at: i64,
}

// =============================================================================
// APP STATE
// =============================================================================

/// Shared application state. Clone is required by Axum; every field is
/// cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ChatStore>,
    pub responder: Arc<dyn Responder>,
    pub live: Arc<LiveHub>,
    pub identity_header: HeaderName,
    pub dedup_window_ms: i64,
}

impl AppState {
    #[must_use]
    pub fn new(
        store: Arc<dyn ChatStore>,
        responder: Arc<dyn Responder>,
        live: Arc<LiveHub>,
        config: &AppConfig,
    ) -> Self {
        Self {
            store,
            responder,
            live,
            identity_header: config.identity_header.clone(),
            dedup_window_ms: config.dedup_window_ms,
        }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================


#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
