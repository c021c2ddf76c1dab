use super::*;
use axum::Json;
use axum::Router;
use axum::http::{StatusCode, header};
use axum::routing::post;
use serde_json::{Value, json};
use uuid::Uuid;

async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    format!("http://{addr}/webhook")
}

fn client(url: String) -> WebhookClient {
    let config = WebhookConfig { url, request_timeout_secs: Some(5), connect_timeout_secs: 2 };
    WebhookClient::new(&config).expect("client should build")
}

fn request() -> WebhookRequest {
    WebhookRequest { message: "hi bot".into(), chat_id: Uuid::new_v4(), user_id: Uuid::new_v4() }
}

// =============================================================================
// decode_success_body
// =============================================================================

#[test]
fn decode_rejects_empty_body() {
    assert!(matches!(decode_success_body(Some("application/json"), ""), Err(ResponderError::EmptyBody)));
    assert!(matches!(decode_success_body(None, "  \n"), Err(ResponderError::EmptyBody)));
}

#[test]
fn decode_empty_json_object_is_unrecognized() {
    let result = decode_success_body(Some("application/json"), "{}").unwrap();
    assert_eq!(result, ReplyExtraction::Unrecognized);
}

// =============================================================================
// HTTP round trips
// =============================================================================

#[tokio::test]
async fn posts_request_payload_as_json() {
    let router = Router::new().route(
        "/webhook",
        post(|Json(body): Json<Value>| async move {
            let echoed = format!(
                "{}|{}|{}",
                body["message"].as_str().unwrap_or(""),
                body["chat_id"].as_str().unwrap_or(""),
                body["user_id"].as_str().unwrap_or("")
            );
            Json(json!({ "bot_response": echoed }))
        }),
    );
    let url = serve(router).await;
    let req = request();

    let reply = client(url).respond(&req).await.unwrap();
    assert_eq!(reply, ReplyExtraction::Reply(format!("hi bot|{}|{}", req.chat_id, req.user_id)));
}

#[tokio::test]
async fn json_output_field_is_extracted() {
    let router = Router::new().route(
        "/webhook",
        post(|| async { ([(header::CONTENT_TYPE, "application/json")], r#"{"output":"hello"}"#) }),
    );
    let url = serve(router).await;

    let reply = client(url).respond(&request()).await.unwrap();
    assert_eq!(reply, ReplyExtraction::Reply("hello".into()));
}

#[tokio::test]
async fn plain_text_marker_is_stripped() {
    let router = Router::new().route("/webhook", post(|| async { "=hello" }));
    let url = serve(router).await;

    let reply = client(url).respond(&request()).await.unwrap();
    assert_eq!(reply, ReplyExtraction::Reply("hello".into()));
}

#[tokio::test]
async fn non_success_status_is_an_error() {
    let router = Router::new().route("/webhook", post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }));
    let url = serve(router).await;

    let err = client(url).respond(&request()).await.unwrap_err();
    assert!(matches!(err, ResponderError::Status { status: 500, ref body } if body == "boom"));
    assert!(crate::frame::ErrorCode::retryable(&err));
}

#[tokio::test]
async fn client_error_status_is_not_retryable() {
    let router = Router::new().route("/webhook", post(|| async { StatusCode::NOT_FOUND }));
    let url = serve(router).await;

    let err = client(url).respond(&request()).await.unwrap_err();
    assert!(matches!(err, ResponderError::Status { status: 404, .. }));
    assert!(!crate::frame::ErrorCode::retryable(&err));
}

#[tokio::test]
async fn empty_success_body_is_an_error() {
    let router = Router::new().route("/webhook", post(|| async { StatusCode::OK }));
    let url = serve(router).await;

    let err = client(url).respond(&request()).await.unwrap_err();
    assert!(matches!(err, ResponderError::EmptyBody));
}

#[tokio::test]
async fn connection_refused_is_a_request_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let err = client(format!("http://{addr}/webhook"))
        .respond(&request())
        .await
        .unwrap_err();
    assert!(matches!(err, ResponderError::Request(_)));
}

#[test]
fn client_keeps_configured_url() {
    let c = client("https://hooks.example.test/chatbot".into());
    assert_eq!(c.url(), "https://hooks.example.test/chatbot");
}
