//! buddychat: chat relay between a Postgres-backed conversation store and
//! an AI responder webhook.
//!
//! ARCHITECTURE
//! ============
//! Two pieces of real logic sit behind a thin HTTP/WebSocket surface:
//! - `services::dedup` turns every live snapshot of a chat's messages into
//!   the display sequence, suppressing near-duplicate echoes.
//! - `services::pipeline` runs the multi-stage send (user message → chat
//!   touch → webhook → bot reply) with a fallback at every stage.
//!
//! The two never talk to each other directly; they are coupled only through
//! the store and its change notifications (`services::live`).

pub mod config;
pub mod db;
pub mod frame;
pub mod responder;
pub mod routes;
pub mod services;
pub mod state;
