//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! REST endpoints cover the chat list (create, list/search, clear) and
//! one-shot message reads; the chat view itself lives on the `/api/ws`
//! socket, which carries live message pushes and sends. Every route reads
//! the caller's identity from the header set by the upstream identity
//! provider.

pub mod chats;
pub mod identity;
pub mod ws;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Full application router.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(
            "/api/chats",
            get(chats::list_chats)
                .post(chats::create_chat)
                .delete(chats::delete_all_chats),
        )
        .route("/api/chats/{id}/messages", get(chats::list_messages))
        .route("/api/ws", get(ws::handle_ws))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
