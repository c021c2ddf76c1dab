//! Domain services used by websocket and HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! `store` and `live` are the persistence collaborator and its change feed.
//! `dedup` and `pipeline` are the chat core; `chats` is the list/CRUD glue
//! the routes call directly. Route handlers stay focused on protocol
//! translation.

pub mod chats;
pub mod dedup;
pub mod live;
pub mod pipeline;
pub mod store;
