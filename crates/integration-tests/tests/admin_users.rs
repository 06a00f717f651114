//! Integration tests for the user roster.
//!
//! Run with: cargo test -p star-admin-integration-tests

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;

use star_admin::data::{InMemoryDataService, Operation};
use star_admin_core::User;
use star_admin_integration_tests::{TestApp, admin_user_id, at, customer};

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

fn roster() -> InMemoryDataService {
    let data = InMemoryDataService::new(admin_user_id());
    data.seed_user(User {
        id: customer(1),
        email: Some("ada@example.com".to_string()),
        created_at: at(0),
        last_sign_in_at: Some(at(90)),
    });
    data.seed_user(User {
        id: customer(2),
        email: Some("grace@example.com".to_string()),
        created_at: at(30),
        last_sign_in_at: None,
    });
    data
}

#[tokio::test]
async fn test_users_page_lists_accounts() {
    let app = TestApp::spawn_with(roster()).await;

    let resp = app.get("/users").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = resp.text().await.unwrap();

    assert!(body.contains("Registered Users (2)"));
    assert!(body.contains("ada@example.com"));
    assert!(body.contains("2024-06-01 12:00:00 UTC"));
    assert!(body.contains("2024-06-01 13:30:00 UTC"));
    assert!(body.contains("grace@example.com"));
    assert!(body.contains("<td>Never</td>"));
}

#[tokio::test]
async fn test_users_page_without_service_key() {
    let app = TestApp::spawn_with(roster().without_service_key()).await;

    let resp = app.get("/users").await;

    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = resp.text().await.unwrap();
    assert!(body.contains("Error loading users: Supabase service key not found."));
    assert!(body.contains("Registered Users (0)"));
}

#[tokio::test]
async fn test_users_listing_failure() {
    let data = roster();
    data.fail(Operation::ListUsers, "User not allowed");
    let app = TestApp::spawn_with(data).await;

    let resp = app.get("/users").await;

    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    assert!(
        resp.text()
            .await
            .unwrap()
            .contains("Error loading users: User not allowed")
    );
}

#[tokio::test]
async fn test_users_api() {
    let app = TestApp::spawn_with(roster()).await;

    let users: Vec<Value> = app.get("/api/users").await.json().await.unwrap();

    assert_eq!(users.len(), 2);
    assert_eq!(users[0]["email"], "ada@example.com");
    assert!(users[1]["last_sign_in_at"].is_null());
}

#[tokio::test]
async fn test_users_api_without_service_key() {
    let app = TestApp::spawn_with(roster().without_service_key()).await;

    let resp = app.get("/api/users").await;

    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: ErrorBody = resp.json().await.unwrap();
    assert!(body.error.contains("SUPABASE_SERVICE_KEY"));
}
