//! WebSocket handler: one socket is one chat view.
//!
//! DESIGN
//! ======
//! A connection owns the view's state: the selected chat, its `SendGuard`,
//! and at most one live feed task. The receive loop `select!`s between
//! inbound client frames and an outbound channel fed by background tasks
//! (feed pushes, finished sends).
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → `session:connected`
//! 2. `chat:select` → replace the feed task; it pushes `chat:messages`
//!    with the deduplicated display sequence on every change
//! 3. `chat:send` → preconditions checked inline; an accepted send replies
//!    `item {sending: true}` now and `done {outcome}` when the pipeline ends
//! 4. Close → abort the feed task. Running sends are left to finish.

use axum::extract::State;
use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::frame::{Data, Frame, Status};
use crate::routes::identity::Identity;
use crate::services::live::{DisplayFeed, MessageFeed};
use crate::services::pipeline::{SendGuard, SendOutcome, begin_send, run_send};
use crate::state::AppState;

const OUTBOUND_BUFFER: usize = 64;

// =============================================================================
// CONNECTION STATE
// =============================================================================

/// Per-socket chat view.
struct ChatView {
    connection_id: Uuid,
    user_id: Option<Uuid>,
    chat_id: Option<Uuid>,
    guard: SendGuard,
    feed: Option<JoinHandle<()>>,
    outbound: mpsc::Sender<Frame>,
}

impl ChatView {
    fn new(user_id: Option<Uuid>, outbound: mpsc::Sender<Frame>) -> Self {
        Self { connection_id: Uuid::new_v4(), user_id, chat_id: None, guard: SendGuard::new(), feed: None, outbound }
    }

    fn stop_feed(&mut self) {
        if let Some(task) = self.feed.take() {
            task.abort();
        }
    }
}

impl Drop for ChatView {
    fn drop(&mut self) {
        self.stop_feed();
    }
}

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(State(state): State<AppState>, Identity(user_id): Identity, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| run_ws(socket, state, user_id))
}

async fn run_ws(mut socket: WebSocket, state: AppState, user_id: Option<Uuid>) {
    let (outbound, mut outbound_rx) = mpsc::channel::<Frame>(OUTBOUND_BUFFER);
    let mut view = ChatView::new(user_id, outbound);

    let welcome = Frame::request("session:connected", Data::new())
        .with_data("connection_id", view.connection_id.to_string())
        .with_data("user_id", user_id.map(|id| id.to_string()));
    if send_frame(&mut socket, &welcome).await.is_err() {
        return;
    }

    info!(connection_id = %view.connection_id, user_id = ?user_id, "ws: client connected");

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                match msg {
                    WsMessage::Text(text) => {
                        for frame in process_inbound_text(&state, &mut view, text.as_str()) {
                            let _ = send_frame(&mut socket, &frame).await;
                        }
                    }
                    WsMessage::Close(_) => break,
                    _ => {}
                }
            }
            Some(frame) = outbound_rx.recv() => {
                if send_frame(&mut socket, &frame).await.is_err() {
                    break;
                }
            }
        }
    }

    info!(connection_id = %view.connection_id, "ws: client disconnected");
}

// =============================================================================
// FRAME DISPATCH
// =============================================================================

/// Parse and handle one inbound text frame; returns the immediate replies.
/// Later frames (feed pushes, send completion) go through `view.outbound`.
fn process_inbound_text(state: &AppState, view: &mut ChatView, text: &str) -> Vec<Frame> {
    let mut req: Frame = match serde_json::from_str(text) {
        Ok(r) => r,
        Err(e) => {
            warn!(connection_id = %view.connection_id, error = %e, "ws: invalid inbound frame");
            let err = Frame::request("gateway:error", Data::new()).with_data("message", format!("invalid json: {e}"));
            return vec![err];
        }
    };

    req.from = view.user_id.map(|id| id.to_string());
    info!(connection_id = %view.connection_id, id = %req.id, syscall = %req.syscall, "ws: recv frame");

    let prefix = req.prefix().to_string();
    match prefix.as_str() {
        "chat" => handle_chat(state, view, &mut req),
        _ => vec![req.error(format!("unknown prefix: {prefix}"))],
    }
}

fn handle_chat(state: &AppState, view: &mut ChatView, req: &mut Frame) -> Vec<Frame> {
    let op = req.syscall.split_once(':').map_or_else(String::new, |(_, op)| op.to_string());
    match op.as_str() {
        "select" => select_chat(state, view, req),
        "send" => send_message(state, view, req),
        _ => vec![req.error(format!("unknown chat op: {op}"))],
    }
}

fn select_chat(state: &AppState, view: &mut ChatView, req: &Frame) -> Vec<Frame> {
    let Some(chat_id) = req.chat_id.or_else(|| {
        req.data
            .get("chat_id")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse().ok())
    }) else {
        return vec![req.error("chat_id required")];
    };

    view.stop_feed();
    view.chat_id = Some(chat_id);

    // Without an identity the chat is selected but nothing is subscribed.
    let subscribed = match view.user_id {
        Some(user_id) => {
            view.feed = Some(spawn_feed(state, chat_id, user_id, view.outbound.clone()));
            true
        }
        None => {
            warn!(connection_id = %view.connection_id, %chat_id, "ws: no identity, live feed not started");
            false
        }
    };

    let mut data = Data::new();
    data.insert("chat_id".into(), json!(chat_id));
    data.insert("subscribed".into(), json!(subscribed));
    vec![req.done_with(data).with_chat_id(chat_id)]
}

fn send_message(state: &AppState, view: &ChatView, req: &mut Frame) -> Vec<Frame> {
    let content = req.data.get("content").and_then(|v| v.as_str()).unwrap_or_default();

    let (permit, request) = match begin_send(&view.guard, view.chat_id, view.user_id, content) {
        Ok(accepted) => accepted,
        Err(rejected) => {
            info!(connection_id = %view.connection_id, reason = %rejected, "ws: send rejected");
            return vec![req.error_from(&rejected)];
        }
    };
    req.chat_id = Some(request.chat_id);

    let store = state.store.clone();
    let responder = state.responder.clone();
    let outbound = view.outbound.clone();
    let origin = req.clone();
    tokio::spawn(async move {
        let outcome = run_send(store.as_ref(), responder.as_ref(), permit, request).await;
        // The socket may be gone by now; the writes above still happened.
        let _ = outbound.send(origin.done_with(outcome_data(&outcome))).await;
    });

    let mut data = Data::new();
    data.insert("sending".into(), json!(true));
    vec![req.item(data)]
}

fn spawn_feed(state: &AppState, chat_id: Uuid, user_id: Uuid, outbound: mpsc::Sender<Frame>) -> JoinHandle<()> {
    let mut feed = DisplayFeed::new(
        MessageFeed::subscribe(state.store.clone(), &state.live, chat_id, user_id),
        state.dedup_window_ms,
    );
    tokio::spawn(async move {
        while let Some(snapshot) = feed.next().await {
            match snapshot {
                Ok(messages) => {
                    let frame = Frame::request("chat:messages", Data::new())
                        .with_chat_id(chat_id)
                        .with_data("messages", serde_json::to_value(&messages).unwrap_or_default());
                    if outbound.send(frame).await.is_err() {
                        break;
                    }
                }
                Err(e) => warn!(%chat_id, error = %e, "ws: live feed read failed"),
            }
        }
    })
}

fn outcome_data(outcome: &SendOutcome) -> Data {
    match serde_json::to_value(outcome) {
        Ok(serde_json::Value::Object(map)) => map.into_iter().collect(),
        _ => Data::from([("outcome".to_string(), json!(outcome.kind()))]),
    }
}

// =============================================================================
// OUTBOUND
// =============================================================================

async fn send_frame(socket: &mut WebSocket, frame: &Frame) -> Result<(), ()> {
    let json = match serde_json::to_string(frame) {
        Ok(j) => j,
        Err(e) => {
            warn!(error = %e, "ws: failed to serialize frame");
            return Err(());
        }
    };
    if frame.status == Status::Error {
        let code = frame
            .data
            .get("code")
            .and_then(|v| v.as_str())
            .unwrap_or("-");
        let message = frame
            .data
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("-");
        warn!(id = %frame.id, syscall = %frame.syscall, code, message, "ws: send frame status=Error");
    } else {
        info!(id = %frame.id, syscall = %frame.syscall, status = ?frame.status, "ws: send frame");
    }
    socket
        .send(WsMessage::Text(json.into()))
        .await
        .map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
