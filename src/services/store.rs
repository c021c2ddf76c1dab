//! Store service: the persistent chat/message collaborator.
//!
//! DESIGN
//! ======
//! Callers depend on the narrow `ChatStore` trait; `PgChatStore` backs it
//! with Postgres. Every message write fires the `message_changes` trigger,
//! which is how live feeds learn about changes (see `services::live`).
//!
//! Ownership is enforced in SQL: a message can only be inserted into, and
//! listed from, a chat owned by the caller.

use sqlx::PgPool;
use uuid::Uuid;

use crate::state::{Chat, ChatSummary, ChatTouch, LastMessage, Message, NewMessage};

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("chat not found: {0}")]
    ChatNotFound(Uuid),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl crate::frame::ErrorCode for StoreError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::ChatNotFound(_) => "E_CHAT_NOT_FOUND",
            Self::Database(_) => "E_DATABASE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

/// Async seam in front of the persistent store. Enables mocking in tests.
#[async_trait::async_trait]
pub trait ChatStore: Send + Sync {
    /// Persist one message into a chat owned by `message.user_id`.
    ///
    /// # Errors
    ///
    /// [`StoreError::ChatNotFound`] if the chat does not exist or belongs to
    /// someone else; [`StoreError::Database`] on query failure.
    async fn insert_message(&self, message: NewMessage) -> Result<Message, StoreError>;

    /// Refresh a chat's `updated_at` to now.
    ///
    /// # Errors
    ///
    /// [`StoreError::ChatNotFound`] if the chat does not exist.
    async fn touch_chat(&self, chat_id: Uuid) -> Result<ChatTouch, StoreError>;

    /// All messages of a chat owned by `user_id`, ascending by `created_at`.
    /// Chats the user does not own read as empty.
    ///
    /// # Errors
    ///
    /// Returns a database error if the query fails.
    async fn list_messages(&self, chat_id: Uuid, user_id: Uuid) -> Result<Vec<Message>, StoreError>;

    /// # Errors
    ///
    /// Returns a database error if the insert fails.
    async fn create_chat(&self, user_id: Uuid, title: &str) -> Result<Chat, StoreError>;

    /// The user's chats, most recently updated first.
    ///
    /// # Errors
    ///
    /// Returns a database error if the query fails.
    async fn list_chats(&self, user_id: Uuid) -> Result<Vec<ChatSummary>, StoreError>;

    /// Delete every chat of the user (messages cascade). Returns rows affected.
    ///
    /// # Errors
    ///
    /// Returns a database error if the delete fails.
    async fn delete_user_chats(&self, user_id: Uuid) -> Result<u64, StoreError>;
}

// =============================================================================
// POSTGRES
// =============================================================================

type MessageRow = (Uuid, Uuid, Uuid, String, bool, i64);
type SummaryRow = (Uuid, Uuid, String, i64, i64, Option<String>, Option<i64>);

fn message_from_row((id, chat_id, user_id, content, is_bot, created_at): MessageRow) -> Message {
    Message { id, chat_id, user_id, content, is_bot, created_at }
}

pub struct PgChatStore {
    pool: PgPool,
}

impl PgChatStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ChatStore for PgChatStore {
    async fn insert_message(&self, message: NewMessage) -> Result<Message, StoreError> {
        let row = sqlx::query_as::<_, MessageRow>(
            "INSERT INTO messages (id, chat_id, user_id, content, is_bot)
             SELECT $1, c.id, $3, $4, $5
             FROM chats c
             WHERE c.id = $2 AND c.user_id = $3
             RETURNING id, chat_id, user_id, content, is_bot,
                       (EXTRACT(EPOCH FROM created_at) * 1000)::BIGINT",
        )
        .bind(Uuid::new_v4())
        .bind(message.chat_id)
        .bind(message.user_id)
        .bind(&message.content)
        .bind(message.is_bot)
        .fetch_optional(&self.pool)
        .await?;

        row.map(message_from_row)
            .ok_or(StoreError::ChatNotFound(message.chat_id))
    }

    async fn touch_chat(&self, chat_id: Uuid) -> Result<ChatTouch, StoreError> {
        let row = sqlx::query_as::<_, (Uuid, i64)>(
            "UPDATE chats SET updated_at = now()
             WHERE id = $1
             RETURNING id, (EXTRACT(EPOCH FROM updated_at) * 1000)::BIGINT",
        )
        .bind(chat_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some((id, updated_at)) = row else {
            return Err(StoreError::ChatNotFound(chat_id));
        };
        Ok(ChatTouch { id, updated_at })
    }

    async fn list_messages(&self, chat_id: Uuid, user_id: Uuid) -> Result<Vec<Message>, StoreError> {
        let rows = sqlx::query_as::<_, MessageRow>(
            "SELECT m.id, m.chat_id, m.user_id, m.content, m.is_bot,
                    (EXTRACT(EPOCH FROM m.created_at) * 1000)::BIGINT
             FROM messages m
             JOIN chats c ON c.id = m.chat_id
             WHERE m.chat_id = $1 AND c.user_id = $2
             ORDER BY m.created_at ASC, m.id ASC",
        )
        .bind(chat_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(message_from_row).collect())
    }

    async fn create_chat(&self, user_id: Uuid, title: &str) -> Result<Chat, StoreError> {
        let (id, user_id, title, created_at, updated_at) = sqlx::query_as::<_, (Uuid, Uuid, String, i64, i64)>(
            "INSERT INTO chats (id, user_id, title)
             VALUES ($1, $2, $3)
             RETURNING id, user_id, title,
                       (EXTRACT(EPOCH FROM created_at) * 1000)::BIGINT,
                       (EXTRACT(EPOCH FROM updated_at) * 1000)::BIGINT",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(title)
        .fetch_one(&self.pool)
        .await?;

        Ok(Chat { id, user_id, title, created_at, updated_at })
    }

    async fn list_chats(&self, user_id: Uuid) -> Result<Vec<ChatSummary>, StoreError> {
        let rows = sqlx::query_as::<_, SummaryRow>(
            "SELECT c.id, c.user_id, c.title,
                    (EXTRACT(EPOCH FROM c.created_at) * 1000)::BIGINT,
                    (EXTRACT(EPOCH FROM c.updated_at) * 1000)::BIGINT,
                    lm.content,
                    (EXTRACT(EPOCH FROM lm.created_at) * 1000)::BIGINT
             FROM chats c
             LEFT JOIN LATERAL (
                 SELECT content, created_at
                 FROM messages
                 WHERE chat_id = c.id
                 ORDER BY created_at DESC, id DESC
                 LIMIT 1
             ) lm ON TRUE
             WHERE c.user_id = $1
             ORDER BY c.updated_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, user_id, title, created_at, updated_at, last_content, last_at)| {
                let last_message = last_content
                    .zip(last_at)
                    .map(|(content, created_at)| LastMessage { content, created_at });
                ChatSummary { chat: Chat { id, user_id, title, created_at, updated_at }, last_message }
            })
            .collect())
    }

    async fn delete_user_chats(&self, user_id: Uuid) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM chats WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
