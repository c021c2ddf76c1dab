//! Chat list service: a user's chats and their display messages.
//!
//! Thin layer over `ChatStore` for the REST routes. Title search is applied
//! here, after the store has ordered chats by most recent activity.

use time::{Date, OffsetDateTime};
use tracing::info;
use uuid::Uuid;

use crate::services::dedup::display_messages;
use crate::services::store::{ChatStore, StoreError};
use crate::state::{Chat, ChatSummary, Message};

/// Title given to chats created without one, e.g. `Chat 2026-10-17`.
#[must_use]
pub fn default_title(today: Date) -> String {
    format!("Chat {today}")
}

/// Create a chat. A missing or blank title gets `default_title` for today (UTC).
///
/// # Errors
///
/// Returns a store error if the insert fails.
pub async fn create_chat(store: &dyn ChatStore, user_id: Uuid, title: Option<&str>) -> Result<Chat, StoreError> {
    let title = match title.map(str::trim) {
        Some(t) if !t.is_empty() => t.to_string(),
        _ => default_title(OffsetDateTime::now_utc().date()),
    };
    let chat = store.create_chat(user_id, &title).await?;
    info!(chat_id = %chat.id, %user_id, title = %chat.title, "chats: created");
    Ok(chat)
}

/// The user's chats, most recently updated first, optionally filtered by a
/// case-insensitive title substring.
///
/// # Errors
///
/// Returns a store error if the query fails.
pub async fn list_chats(
    store: &dyn ChatStore,
    user_id: Uuid,
    query: Option<&str>,
) -> Result<Vec<ChatSummary>, StoreError> {
    let chats = store.list_chats(user_id).await?;
    let needle = query.map(str::trim).unwrap_or_default().to_lowercase();
    if needle.is_empty() {
        return Ok(chats);
    }
    Ok(chats
        .into_iter()
        .filter(|c| c.chat.title.to_lowercase().contains(&needle))
        .collect())
}

/// Delete every chat the user owns. Returns the number of chats removed.
///
/// # Errors
///
/// Returns a store error if the delete fails.
pub async fn delete_all_chats(store: &dyn ChatStore, user_id: Uuid) -> Result<u64, StoreError> {
    let affected = store.delete_user_chats(user_id).await?;
    info!(%user_id, affected, "chats: deleted all");
    Ok(affected)
}

/// One-shot read of a chat's display sequence.
///
/// # Errors
///
/// Returns a store error if the query fails.
pub async fn chat_display_messages(
    store: &dyn ChatStore,
    user_id: Uuid,
    chat_id: Uuid,
    window_ms: i64,
) -> Result<Vec<Message>, StoreError> {
    let messages = store.list_messages(chat_id, user_id).await?;
    Ok(display_messages(&messages, window_ms))
}

#[cfg(test)]
#[path = "chats_test.rs"]
mod tests;
