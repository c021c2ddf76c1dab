//! Stream deduplicator: live message snapshot → display sequence.
//!
//! DESIGN
//! ======
//! A write can surface twice in the live feed: once from the direct insert
//! and once from the store's echo. Two messages are the "same" when they
//! share a `DedupKey` (role, author, normalized content). Walking the
//! snapshot in order, a message is dropped when the last *retained* message
//! with its key is within the window; otherwise it is kept and becomes the
//! new reference point for that key. Only the later duplicate is ever
//! dropped, and retained messages keep their input order.
//!
//! The function is pure and always recomputed over the full snapshot, never
//! patched incrementally.

use std::collections::HashMap;

use uuid::Uuid;

use crate::state::{Message, Role};

/// Lowercase, collapse whitespace runs to one space, trim both ends.
#[must_use]
pub fn normalize_content(content: &str) -> String {
    content
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub role: Role,
    pub user_id: Uuid,
    pub content: String,
}

impl DedupKey {
    #[must_use]
    pub fn of(message: &Message) -> Self {
        Self { role: message.role(), user_id: message.user_id, content: normalize_content(&message.content) }
    }
}

/// Filter a chat's ordered messages down to what should be displayed.
///
/// A message is suppressed when the most recently retained message with the
/// same key is at most `window_ms` away (inclusive).
#[must_use]
pub fn display_messages(messages: &[Message], window_ms: i64) -> Vec<Message> {
    let mut last_kept: HashMap<DedupKey, i64> = HashMap::new();
    let mut out = Vec::with_capacity(messages.len());

    for message in messages {
        let key = DedupKey::of(message);
        if let Some(&kept_at) = last_kept.get(&key)
            && message.created_at.abs_diff(kept_at) <= window_ms.unsigned_abs()
        {
            continue;
        }
        last_kept.insert(key, message.created_at);
        out.push(message.clone());
    }

    out
}

#[cfg(test)]
#[path = "dedup_test.rs"]
mod tests;
