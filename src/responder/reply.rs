//! Webhook body decoding and reply extraction.
//!
//! DESIGN
//! ======
//! The responder is an automation workflow we do not control. Depending on
//! how it is wired it answers with JSON under one of several field names, or
//! with plain text (sometimes prefixed with `=` by its text-mode template).
//! Decoding normalizes every shape to a JSON object, then extraction probes a
//! fixed field list and reports `Unrecognized` instead of guessing further.

use serde_json::{Map, Value};

use super::types::ReplyExtraction;

/// Top-level fields probed in order; first non-empty string wins.
pub const REPLY_FIELDS: [&str; 8] = ["bot_response", "response", "message", "output", "data", "result", "text", "content"];

/// Fields probed under a nested `body` object after the top-level ones.
pub const NESTED_REPLY_FIELDS: [&str; 2] = ["response", "message"];

const TEXT_FIELD: &str = "text";

/// Decode a webhook body into a JSON object.
///
/// JSON content types are parsed (falling back to `{text: body}` on parse
/// failure); anything else is wrapped as `{text: body}`. A bare JSON string
/// is wrapped the same way. A leading `=` marker is stripped from `text`.
#[must_use]
pub fn parse_reply_body(content_type: Option<&str>, body: &str) -> Value {
    let is_json = content_type.is_some_and(|ct| ct.to_ascii_lowercase().contains("application/json"));

    let mut value = if is_json {
        serde_json::from_str::<Value>(body).unwrap_or_else(|_| wrap_text(body))
    } else {
        wrap_text(body)
    };

    if let Value::String(s) = value {
        value = wrap_text(&s);
    }

    if let Some(Value::String(text)) = value.get_mut(TEXT_FIELD) {
        if text.starts_with('=') {
            *text = strip_text_marker(text).to_string();
        }
    }

    value
}

/// Probe a decoded body for the reply text.
#[must_use]
pub fn extract_reply(value: &Value) -> ReplyExtraction {
    let found = REPLY_FIELDS
        .iter()
        .find_map(|field| non_empty_str(value.get(field)))
        .or_else(|| {
            let body = value.get("body")?;
            NESTED_REPLY_FIELDS
                .iter()
                .find_map(|field| non_empty_str(body.get(field)))
        });

    match found {
        Some(text) => ReplyExtraction::Reply(text.to_string()),
        None => ReplyExtraction::Unrecognized,
    }
}

fn wrap_text(body: &str) -> Value {
    let mut map = Map::new();
    map.insert(TEXT_FIELD.into(), Value::String(body.to_string()));
    Value::Object(map)
}

fn strip_text_marker(text: &str) -> &str {
    match text.strip_prefix('=') {
        Some(rest) => rest.trim_start(),
        None => text,
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|s| !s.is_empty())
}

#[cfg(test)]
#[path = "reply_test.rs"]
mod tests;
