//! Chat REST routes.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use tracing::error;
use uuid::Uuid;

use crate::routes::identity::UserId;
use crate::services::chats as chats_svc;
use crate::services::store::StoreError;
use crate::state::{AppState, Chat, ChatSummary, Message};

#[derive(Debug, Default, Deserialize)]
pub struct ListChatsQuery {
    pub q: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateChatBody {
    pub title: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DeleteChatsResponse {
    pub affected_rows: u64,
}

pub(crate) fn store_error_to_status(err: StoreError) -> StatusCode {
    match err {
        StoreError::ChatNotFound(_) => StatusCode::NOT_FOUND,
        StoreError::Database(e) => {
            error!(error = %e, "chats: store query failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// `GET /api/chats?q=`: the caller's chats, newest activity first.
pub async fn list_chats(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Query(query): Query<ListChatsQuery>,
) -> Result<Json<Vec<ChatSummary>>, StatusCode> {
    let chats = chats_svc::list_chats(state.store.as_ref(), user_id, query.q.as_deref())
        .await
        .map_err(store_error_to_status)?;
    Ok(Json(chats))
}

/// `POST /api/chats`: create a chat, titled or dated.
pub async fn create_chat(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Json(body): Json<CreateChatBody>,
) -> Result<(StatusCode, Json<Chat>), StatusCode> {
    let chat = chats_svc::create_chat(state.store.as_ref(), user_id, body.title.as_deref())
        .await
        .map_err(store_error_to_status)?;
    Ok((StatusCode::CREATED, Json(chat)))
}

/// `DELETE /api/chats`: remove all of the caller's chats.
pub async fn delete_all_chats(
    State(state): State<AppState>,
    UserId(user_id): UserId,
) -> Result<Json<DeleteChatsResponse>, StatusCode> {
    let affected_rows = chats_svc::delete_all_chats(state.store.as_ref(), user_id)
        .await
        .map_err(store_error_to_status)?;
    Ok(Json(DeleteChatsResponse { affected_rows }))
}

/// `GET /api/chats/{id}/messages`: current display sequence of one chat.
pub async fn list_messages(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(chat_id): Path<Uuid>,
) -> Result<Json<Vec<Message>>, StatusCode> {
    let messages = chats_svc::chat_display_messages(state.store.as_ref(), user_id, chat_id, state.dedup_window_ms)
        .await
        .map_err(store_error_to_status)?;
    Ok(Json(messages))
}

#[cfg(test)]
#[path = "chats_test.rs"]
mod tests;
