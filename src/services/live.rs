//! Live subscription: store change signals fanned out to message feeds.
//!
//! ARCHITECTURE
//! ============
//! A trigger on `messages` fires `pg_notify('message_changes', chat_id)`.
//! `spawn_listener` holds one `PgListener` for the process and bumps the
//! chat's version in `LiveHub`. Each `MessageFeed` watches that version and
//! re-reads the whole ordered message list when it moves, so consumers
//! always get full snapshots, never deltas.
//!
//! DESIGN
//! ======
//! `watch` coalesces bursts: several writes between two reads produce one
//! re-read. Channels nobody listens to are pruned on the next notify. After
//! a listener reconnect every open feed is poked, since notifications sent
//! while disconnected are lost.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::services::dedup::display_messages;
use crate::services::store::{ChatStore, StoreError};
use crate::state::Message;

pub const MESSAGE_CHANGES_CHANNEL: &str = "message_changes";

const RECONNECT_DELAY: Duration = Duration::from_secs(2);

// =============================================================================
// HUB
// =============================================================================

/// Per-chat change counters.
#[derive(Debug, Default)]
pub struct LiveHub {
    channels: Mutex<HashMap<Uuid, watch::Sender<u64>>>,
}

impl LiveHub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, watch::Sender<u64>>> {
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Receiver that observes every later `notify(chat_id)`. Channels left
    /// without receivers are pruned here too.
    #[must_use]
    pub fn subscribe(&self, chat_id: Uuid) -> watch::Receiver<u64> {
        let mut channels = self.lock();
        channels.retain(|_, tx| tx.receiver_count() > 0);
        channels
            .entry(chat_id)
            .or_insert_with(|| watch::channel(0).0)
            .subscribe()
    }

    pub fn notify(&self, chat_id: Uuid) {
        let mut channels = self.lock();
        let Some(tx) = channels.get(&chat_id) else {
            return;
        };
        if tx.receiver_count() == 0 {
            channels.remove(&chat_id);
            return;
        }
        tx.send_modify(|version| *version = version.wrapping_add(1));
    }

    /// Poke every chat with live receivers; prune the rest.
    pub fn notify_all(&self) {
        let mut channels = self.lock();
        channels.retain(|_, tx| tx.receiver_count() > 0);
        for tx in channels.values() {
            tx.send_modify(|version| *version = version.wrapping_add(1));
        }
    }

    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.lock().len()
    }
}

// =============================================================================
// LISTENER
// =============================================================================

/// Forward store notifications into `hub` until the process exits.
/// A dropped connection is re-established at once; a failed connect is
/// retried after a fixed delay.
pub fn spawn_listener(pool: PgPool, hub: Arc<LiveHub>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match listen(&pool, &hub).await {
                Ok(()) => warn!(channel = MESSAGE_CHANGES_CHANNEL, "live: listener connection lost, reconnecting"),
                Err(e) => {
                    warn!(error = %e, delay_secs = RECONNECT_DELAY.as_secs(), "live: listener failed, reconnecting");
                    tokio::time::sleep(RECONNECT_DELAY).await;
                }
            }
        }
    })
}

/// One listener connection. Returns `Ok(())` when the connection drops.
///
/// `try_recv` reports a lost connection as `None`; `recv` would reconnect
/// internally and skip the `notify_all` below.
async fn listen(pool: &PgPool, hub: &LiveHub) -> Result<(), sqlx::Error> {
    let mut listener = PgListener::connect_with(pool).await?;
    listener.listen(MESSAGE_CHANGES_CHANNEL).await?;
    info!(channel = MESSAGE_CHANGES_CHANNEL, "live: listening");

    // Changes made while no listener was attached were never signalled.
    hub.notify_all();

    while let Some(notification) = listener.try_recv().await? {
        handle_payload(hub, notification.payload());
    }
    Ok(())
}

/// Parse a notification payload as a chat id and notify it.
pub(crate) fn handle_payload(hub: &LiveHub, payload: &str) -> Option<Uuid> {
    match Uuid::parse_str(payload.trim()) {
        Ok(chat_id) => {
            debug!(%chat_id, "live: change");
            hub.notify(chat_id);
            Some(chat_id)
        }
        Err(e) => {
            warn!(payload, error = %e, "live: ignoring malformed notification");
            None
        }
    }
}

// =============================================================================
// FEEDS
// =============================================================================

/// Full ordered message snapshots of one chat: one immediately, then one
/// after every change signal.
pub struct MessageFeed {
    store: Arc<dyn ChatStore>,
    chat_id: Uuid,
    user_id: Uuid,
    changes: watch::Receiver<u64>,
    primed: bool,
}

impl MessageFeed {
    #[must_use]
    pub fn subscribe(store: Arc<dyn ChatStore>, hub: &LiveHub, chat_id: Uuid, user_id: Uuid) -> Self {
        let changes = hub.subscribe(chat_id);
        Self { store, chat_id, user_id, changes, primed: false }
    }

    #[must_use]
    pub fn chat_id(&self) -> Uuid {
        self.chat_id
    }

    /// Next snapshot. `None` once the hub side is gone. Read errors are
    /// yielded and the feed stays usable.
    pub async fn next(&mut self) -> Option<Result<Vec<Message>, StoreError>> {
        if self.primed {
            self.changes.changed().await.ok()?;
        }
        self.primed = true;
        self.changes.mark_unchanged();
        Some(self.store.list_messages(self.chat_id, self.user_id).await)
    }
}

/// `MessageFeed` mapped through the deduplicator, recomputed per snapshot.
pub struct DisplayFeed {
    feed: MessageFeed,
    window_ms: i64,
}

impl DisplayFeed {
    #[must_use]
    pub fn new(feed: MessageFeed, window_ms: i64) -> Self {
        Self { feed, window_ms }
    }

    #[must_use]
    pub fn chat_id(&self) -> Uuid {
        self.feed.chat_id()
    }

    pub async fn next(&mut self) -> Option<Result<Vec<Message>, StoreError>> {
        let snapshot = self.feed.next().await?;
        Some(snapshot.map(|messages| display_messages(&messages, self.window_ms)))
    }
}

#[cfg(test)]
#[path = "live_test.rs"]
mod tests;
