//! Integration tests for the Telegram Bot API client.
//!
//! Runs a local axum server standing in for `api.telegram.org` and
//! validates request shape, `ok: false` handling, timeouts, and
//! `getUpdates` decoding.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};

use goat_notify::config::TelegramConfig;
use goat_notify::telegram::client::TelegramClient;
use goat_notify::telegram::Messenger;
use goat_notify::AppError;

const TOKEN: &str = "123456-test-token";

type Recorded = Arc<Mutex<Vec<Value>>>;

async fn send_message(
    State(recorded): State<Recorded>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    recorded.lock().unwrap().push(body.clone());
    match body["chat_id"].as_str() {
        Some("blocked") => (
            StatusCode::FORBIDDEN,
            Json(json!({
                "ok": false,
                "error_code": 403,
                "description": "Forbidden: bot was blocked by the user"
            })),
        ),
        Some("slow") => {
            tokio::time::sleep(Duration::from_secs(5)).await;
            (StatusCode::OK, Json(json!({ "ok": true, "result": {} })))
        }
        _ => (
            StatusCode::OK,
            Json(json!({
                "ok": true,
                "result": { "message_id": 1, "chat": { "id": 1 }, "text": body["text"] }
            })),
        ),
    }
}

async fn get_updates(
    State(recorded): State<Recorded>,
    Json(body): Json<Value>,
) -> Json<Value> {
    recorded.lock().unwrap().push(body);
    Json(json!({
        "ok": true,
        "result": [
            {
                "update_id": 41,
                "message": {
                    "message_id": 7,
                    "chat": { "id": 123, "type": "private" },
                    "from": { "id": 555, "is_bot": false, "username": "alice_tg" },
                    "text": "/start abc"
                }
            },
            { "update_id": 42, "edited_message": { "message_id": 8 } }
        ]
    }))
}

async fn spawn_bot_api() -> (String, Recorded) {
    let recorded: Recorded = Arc::default();
    let router = Router::new()
        .route(&format!("/bot{TOKEN}/sendMessage"), post(send_message))
        .route(&format!("/bot{TOKEN}/getUpdates"), post(get_updates))
        .with_state(Arc::clone(&recorded));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    (format!("http://{addr}"), recorded)
}

fn client(base_url: &str, timeout: Duration) -> TelegramClient {
    TelegramClient::new(base_url, TOKEN.to_owned(), timeout).expect("client")
}

#[tokio::test]
async fn send_message_posts_chat_and_text() {
    let (base, recorded) = spawn_bot_api().await;
    let client = client(&base, Duration::from_secs(2));

    client.send_message("123", "hello there").await.expect("send");

    let requests = recorded.lock().unwrap().clone();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0]["chat_id"], "123");
    assert_eq!(requests[0]["text"], "hello there");
}

#[tokio::test]
async fn rejected_message_is_provider_error() {
    let (base, _recorded) = spawn_bot_api().await;
    let client = client(&base, Duration::from_secs(2));

    let err = client
        .send_message("blocked", "hello")
        .await
        .expect_err("should fail");
    match err {
        AppError::Provider(msg) => {
            assert!(msg.contains("403"), "got: {msg}");
            assert!(msg.contains("blocked"), "got: {msg}");
        }
        other => panic!("expected provider error, got {other:?}"),
    }
}

#[tokio::test]
async fn slow_provider_times_out() {
    let (base, _recorded) = spawn_bot_api().await;
    let client = client(&base, Duration::from_millis(200));

    let err = client
        .send_message("slow", "hello")
        .await
        .expect_err("should time out");
    assert!(matches!(err, AppError::Provider(_)));
}

#[tokio::test]
async fn transport_error_does_not_leak_token() {
    // Nothing listens on port 9 of localhost.
    let client = client("http://127.0.0.1:9", Duration::from_millis(500));

    let err = client
        .send_message("123", "hello")
        .await
        .expect_err("should fail");
    assert!(!err.to_string().contains("test-token"), "got: {err}");
}

#[tokio::test]
async fn get_updates_decodes_messages_and_sends_offset() {
    let (base, recorded) = spawn_bot_api().await;
    let client = client(&base, Duration::from_secs(2));

    let updates = client
        .get_updates(Some(41), Duration::from_secs(0))
        .await
        .expect("updates");

    assert_eq!(updates.len(), 2);
    let message = updates[0].message.as_ref().expect("message");
    assert_eq!(message.chat.id, 123);
    assert_eq!(message.text.as_deref(), Some("/start abc"));
    assert_eq!(
        message.from.as_ref().and_then(|f| f.username.as_deref()),
        Some("alice_tg")
    );
    assert!(updates[1].message.is_none());

    let requests = recorded.lock().unwrap().clone();
    assert_eq!(requests[0]["offset"], 41);
    assert_eq!(requests[0]["allowed_updates"], json!(["message"]));
}

#[tokio::test]
async fn missing_bot_token_is_configuration_missing() {
    let config = TelegramConfig::default();
    let result = TelegramClient::from_config(&config);
    assert!(matches!(result, Err(AppError::ConfigurationMissing(_))));
}
