//! Identity extractors.
//!
//! Authentication happens upstream; by the time a request arrives, the
//! identity provider has put the caller's user id in a header (name from
//! `IDENTITY_HEADER`). `Identity` reports what is there, `UserId` insists
//! on it.

use std::convert::Infallible;

use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderName, StatusCode};
use uuid::Uuid;

use crate::state::AppState;

/// Caller's user id, if the identity header carries a valid one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity(pub Option<Uuid>);

/// Caller's user id; rejects with 401 when absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserId(pub Uuid);

/// Parse the identity header. Missing, non-UTF-8, or non-UUID values read
/// as no identity.
#[must_use]
pub fn user_id_from_headers(headers: &HeaderMap, name: &HeaderName) -> Option<Uuid> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s.trim()).ok())
}

impl<S> FromRequestParts<S> for Identity
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        Ok(Self(user_id_from_headers(&parts.headers, &app_state.identity_header)))
    }
}

impl<S> FromRequestParts<S> for UserId
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Ok(Identity(user_id)) = Identity::from_request_parts(parts, state).await;
        user_id.map(Self).ok_or(StatusCode::UNAUTHORIZED)
    }
}

#[cfg(test)]
#[path = "identity_test.rs"]
mod tests;
