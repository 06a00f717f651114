//! Integration tests for admin-to-customer chat.
//!
//! Run with: cargo test -p star-admin-integration-tests

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::time::Duration;

use futures::{Stream, StreamExt};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};

use star_admin::data::{InMemoryDataService, Operation};
use star_admin_core::{Message, MessageId, User};
use star_admin_integration_tests::{TestApp, admin_user_id, at, customer, location};

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Customer A (with email) and B (no roster entry), interleaved.
fn two_customers() -> InMemoryDataService {
    let admin = admin_user_id();
    let data = InMemoryDataService::new(admin);
    data.seed_user(User {
        id: customer(1),
        email: Some("ada@example.com".to_string()),
        created_at: at(-600),
        last_sign_in_at: None,
    });
    data.seed_message(customer(1), admin, "A: is the sofa in stock?", at(1));
    data.seed_message(customer(2), admin, "B: do you deliver?", at(2));
    data.seed_message(admin, customer(1), "A: yes, two weeks", at(3));
    data
}

async fn read_until<S, B>(stream: &mut S, buffer: &mut String, needle: &str)
where
    S: Stream<Item = reqwest::Result<B>> + Unpin,
    B: AsRef<[u8]>,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        while !buffer.contains(needle) {
            let chunk = stream.next().await.unwrap().unwrap();
            buffer.push_str(&String::from_utf8_lossy(chunk.as_ref()));
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {needle:?}; got {buffer:?}"));
}

// ============================================================================
// Conversations
// ============================================================================

#[tokio::test]
async fn test_conversations_most_recent_first() {
    let app = TestApp::spawn_with(two_customers()).await;

    let conversations: Vec<Value> = app.get("/api/conversations").await.json().await.unwrap();

    assert_eq!(conversations.len(), 2);
    assert_eq!(conversations[0]["user_id"], customer(1).to_string());
    assert_eq!(conversations[0]["email"], "ada@example.com");
    assert_eq!(conversations[1]["user_id"], customer(2).to_string());
    assert_eq!(conversations[1]["email"], "Unknown User");
}

#[tokio::test]
async fn test_chat_page_without_selection() {
    let app = TestApp::spawn_with(two_customers()).await;

    let resp = app.get("/chat").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = resp.text().await.unwrap();

    assert!(body.contains("Conversations (2)"));
    assert!(body.find("ada@example.com").unwrap() < body.find("Unknown User").unwrap());
    assert!(body.contains("Select a conversation from the left to start chatting."));
}

#[tokio::test]
async fn test_chat_page_no_conversations() {
    let app = TestApp::spawn().await;

    let body = app.get("/chat").await.text().await.unwrap();

    assert!(body.contains("No active conversations."));
}

#[tokio::test]
async fn test_conversations_failure_shown_inline() {
    let data = two_customers();
    data.fail(Operation::GetConversations, "function get_conversations() does not exist");
    let app = TestApp::spawn_with(data).await;

    let resp = app.get("/chat").await;

    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    let body = resp.text().await.unwrap();
    assert!(body.contains("Could not fetch conversations"));
    assert!(body.contains("No active conversations."));
}

#[tokio::test]
async fn test_conversations_without_service_key() {
    let app = TestApp::spawn_with(two_customers().without_service_key()).await;

    let resp = app.get("/api/conversations").await;

    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: ErrorBody = resp.json().await.unwrap();
    assert!(body.error.starts_with("Could not fetch conversations"));
}

// ============================================================================
// History
// ============================================================================

#[tokio::test]
async fn test_selected_history_is_ordered_and_scoped() {
    let app = TestApp::spawn_with(two_customers()).await;

    let resp = app.get(&format!("/chat?user={}", customer(1))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = resp.text().await.unwrap();

    assert!(body.contains("Chat with ada@example.com"));
    let first = body.find("A: is the sofa in stock?").unwrap();
    let second = body.find("A: yes, two weeks").unwrap();
    assert!(first < second);
    assert!(!body.contains("B: do you deliver?"));

    // The page render does not keep a subscription open
    assert_eq!(app.data.active_subscriptions(), 0);
}

#[tokio::test]
async fn test_history_rendered_while_realtime_down() {
    let data = two_customers();
    data.fail(Operation::Subscribe, "realtime down");
    let app = TestApp::spawn_with(data).await;

    let resp = app.get(&format!("/chat?user={}", customer(1))).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body = resp.text().await.unwrap();
    assert!(body.contains("A: is the sofa in stock?"));
    assert!(body.contains("A: yes, two weeks"));
    assert!(!body.contains("realtime down"));
}

#[tokio::test]
async fn test_history_failure_shown_inline() {
    let data = two_customers();
    data.fail(Operation::ConversationMessages, "timeout");
    let app = TestApp::spawn_with(data).await;

    let resp = app.get(&format!("/chat?user={}", customer(1))).await;

    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    assert!(resp.text().await.unwrap().contains("Error fetching messages: timeout"));
    assert_eq!(app.data.active_subscriptions(), 0);
}

#[tokio::test]
async fn test_invalid_user_query_rejected() {
    let app = TestApp::spawn_with(two_customers()).await;

    let resp = app.get("/chat?user=not-a-uuid").await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(resp.text().await.unwrap().contains("Invalid user id: not-a-uuid"));
}

// ============================================================================
// Sending
// ============================================================================

#[tokio::test]
async fn test_send_json_message() {
    let app = TestApp::spawn_with(two_customers()).await;

    let resp = app
        .client
        .post(app.url(&format!("/chat/{}/messages", customer(1))))
        .json(&json!({ "content": "  See you soon  " }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    let sent = app.data.messages().pop().unwrap();
    assert_eq!(sent.content, "See you soon");
    assert_eq!(sent.sender_id, app.admin);
    assert_eq!(sent.receiver_id, customer(1));
}

#[tokio::test]
async fn test_send_empty_json_message_rejected() {
    let app = TestApp::spawn_with(two_customers()).await;

    let resp = app
        .client
        .post(app.url(&format!("/chat/{}/messages", customer(1))))
        .json(&json!({ "content": "   " }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: ErrorBody = resp.json().await.unwrap();
    assert_eq!(body.error, "Message cannot be empty.");
    assert_eq!(app.data.remote_writes(), 0);
}

#[tokio::test]
async fn test_send_failure_reported() {
    let data = two_customers();
    data.fail(Operation::InsertMessage, "new row violates row-level security policy");
    let app = TestApp::spawn_with(data).await;

    let resp = app
        .client
        .post(app.url(&format!("/chat/{}/messages", customer(1))))
        .json(&json!({ "content": "hello" }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    let body: ErrorBody = resp.json().await.unwrap();
    assert!(body.error.starts_with("Error sending message: "));
}

#[tokio::test]
async fn test_send_form_message_redirects_back() {
    let app = TestApp::spawn_with(two_customers()).await;
    let path = format!("/chat/{}/messages", customer(1));

    let resp = app
        .client
        .post(app.url(&path))
        .form(&[("content", "Thanks!")])
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), format!("/chat?user={}", customer(1)));
    assert_eq!(app.data.messages().pop().unwrap().content, "Thanks!");

    let resp = app
        .client
        .post(app.url(&path))
        .form(&[("content", "")])
        .send()
        .await
        .unwrap();

    assert_eq!(
        location(&resp),
        format!("/chat?user={}&error=Message%20cannot%20be%20empty.", customer(1))
    );
}

// ============================================================================
// Live stream
// ============================================================================

#[tokio::test]
async fn test_stream_sends_history_then_live_messages() {
    let app = TestApp::spawn_with(two_customers()).await;
    let a = customer(1);

    let resp = app.get(&format!("/chat/{a}/stream")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let mut stream = resp.bytes_stream();
    let mut buffer = String::new();

    read_until(&mut stream, &mut buffer, "A: yes, two weeks").await;
    assert!(buffer.contains("event: history"));
    assert!(!buffer.contains("B: do you deliver?"));

    let resp = app
        .client
        .post(app.url(&format!("/chat/{a}/messages")))
        .json(&json!({ "content": "Your order has shipped" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::ACCEPTED);

    read_until(&mut stream, &mut buffer, "Your order has shipped").await;
    assert!(buffer.contains("event: message"));
    assert!(buffer.contains("\"sent\":true"));
}

#[tokio::test]
async fn test_stream_ignores_other_conversations() {
    let app = TestApp::spawn_with(two_customers()).await;
    let admin = app.admin;
    let (a, b) = (customer(1), customer(2));

    let resp = app.get(&format!("/chat/{a}/stream")).await;
    let mut stream = resp.bytes_stream();
    let mut buffer = String::new();
    read_until(&mut stream, &mut buffer, "event: history").await;
    read_until(&mut stream, &mut buffer, "A: yes, two weeks").await;

    app.data.push_event(&Message {
        id: MessageId::new(100),
        sender_id: b,
        receiver_id: admin,
        content: "B: hello?".to_string(),
        created_at: at(10),
    });
    // Already in the history: dropped as a duplicate
    app.data.push_event(&Message {
        id: MessageId::new(3),
        sender_id: admin,
        receiver_id: a,
        content: "A: duplicate".to_string(),
        created_at: at(3),
    });
    app.data.push_event(&Message {
        id: MessageId::new(101),
        sender_id: a,
        receiver_id: admin,
        content: "A: great, thanks".to_string(),
        created_at: at(11),
    });

    read_until(&mut stream, &mut buffer, "A: great, thanks").await;
    assert!(!buffer.contains("B: hello?"));
    assert!(!buffer.contains("A: duplicate"));
    assert!(buffer.contains("\"sent\":false"));
}

#[tokio::test]
async fn test_stream_after_switch_ignores_previous_customer() {
    let app = TestApp::spawn_with(two_customers()).await;
    let admin = app.admin;
    let (a, b) = (customer(1), customer(2));

    let resp = app.get(&format!("/chat/{a}/stream")).await;
    let mut stream = resp.bytes_stream();
    let mut buffer = String::new();
    read_until(&mut stream, &mut buffer, "A: yes, two weeks").await;
    drop(stream);

    let resp = app.get(&format!("/chat/{b}/stream")).await;
    let mut stream = resp.bytes_stream();
    let mut buffer = String::new();
    read_until(&mut stream, &mut buffer, "B: do you deliver?").await;
    assert!(!buffer.contains("A: is the sofa in stock?"));

    app.data.push_event(&Message {
        id: MessageId::new(200),
        sender_id: a,
        receiver_id: admin,
        content: "A: still there?".to_string(),
        created_at: at(20),
    });
    app.data.push_event(&Message {
        id: MessageId::new(201),
        sender_id: admin,
        receiver_id: a,
        content: "A: one moment".to_string(),
        created_at: at(21),
    });
    app.data.push_event(&Message {
        id: MessageId::new(202),
        sender_id: admin,
        receiver_id: b,
        content: "B: yes, nationwide".to_string(),
        created_at: at(22),
    });

    read_until(&mut stream, &mut buffer, "B: yes, nationwide").await;
    assert!(!buffer.contains("A: still there?"));
    assert!(!buffer.contains("A: one moment"));
}

#[tokio::test]
async fn test_stream_reports_history_failure() {
    let data = two_customers();
    data.fail(Operation::ConversationMessages, "timeout");
    let app = TestApp::spawn_with(data).await;

    let resp = app.get(&format!("/chat/{}/stream", customer(1))).await;
    let mut stream = resp.bytes_stream();
    let mut buffer = String::new();

    read_until(&mut stream, &mut buffer, "event: error").await;
    read_until(&mut stream, &mut buffer, "Error fetching messages: timeout").await;
    assert!(!buffer.contains("event: history"));
}
