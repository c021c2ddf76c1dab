//! Responder: the AI webhook collaborator.
//!
//! DESIGN
//! ======
//! The send pipeline only sees the `Responder` trait. `WebhookClient` is the
//! production implementation; tests substitute scripted mocks. Reply
//! extraction returns a typed `ReplyExtraction` so the caller decides what
//! an unrecognized body means instead of the client silently guessing.

pub mod config;
pub mod reply;
pub mod types;
pub mod webhook;

pub use types::{ReplyExtraction, Responder, ResponderError, WebhookRequest};
pub use webhook::WebhookClient;
