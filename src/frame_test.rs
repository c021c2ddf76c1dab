use super::*;

#[derive(Debug, thiserror::Error)]
#[error("chat is busy")]
struct Busy;

impl ErrorCode for Busy {
    fn error_code(&self) -> &'static str {
        "E_BUSY"
    }

    fn retryable(&self) -> bool {
        true
    }
}

#[test]
fn request_sets_fields() {
    let frame = Frame::request("chat:send", Data::new());
    assert_eq!(frame.syscall, "chat:send");
    assert_eq!(frame.status, Status::Request);
    assert!(frame.parent_id.is_none());
    assert!(frame.chat_id.is_none());
    assert!(frame.ts > 0);
}

#[test]
fn replies_inherit_chat_and_syscall() {
    let chat_id = Uuid::new_v4();
    let req = Frame::request("chat:send", Data::new()).with_chat_id(chat_id);

    let item = req.item(Data::new());
    assert_eq!(item.parent_id, Some(req.id));
    assert_eq!(item.chat_id, Some(chat_id));
    assert_eq!(item.syscall, "chat:send");
    assert_eq!(item.status, Status::Item);

    let done = req.done_with(Data::from([("outcome".to_string(), serde_json::json!("replied"))]));
    assert_eq!(done.status, Status::Done);
    assert_eq!(done.data.get("outcome").and_then(|v| v.as_str()), Some("replied"));
}

#[test]
fn prefix_extraction() {
    assert_eq!(Frame::request("chat:select", Data::new()).prefix(), "chat");
    assert_eq!(Frame::request("ping", Data::new()).prefix(), "ping");
}

#[test]
fn error_from_typed_error() {
    let req = Frame::request("chat:send", Data::new());
    let err = req.error_from(&Busy);

    assert_eq!(err.status, Status::Error);
    assert_eq!(err.data.get(FRAME_CODE).and_then(|v| v.as_str()), Some("E_BUSY"));
    assert_eq!(err.data.get(FRAME_MESSAGE).and_then(|v| v.as_str()), Some("chat is busy"));
    assert_eq!(err.data.get(FRAME_RETRYABLE).and_then(serde_json::Value::as_bool), Some(true));
}

#[test]
fn client_frame_without_optional_fields_deserializes() {
    let raw = r#"{"id":"6f1b3c1e-8c77-4d2a-9b57-1d0f1a2b3c4d","parent_id":null,"ts":1,"syscall":"chat:select","status":"request"}"#;
    let frame: Frame = serde_json::from_str(raw).expect("deserialize");
    assert_eq!(frame.syscall, "chat:select");
    assert!(frame.chat_id.is_none());
    assert!(frame.data.is_empty());
}

#[test]
fn chat_id_omitted_when_absent() {
    let json = serde_json::to_value(Frame::request("chat:messages", Data::new())).expect("serialize");
    assert!(json.get("chat_id").is_none());
    assert_eq!(json["status"], "request");
}
