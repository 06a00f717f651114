//! Integration tests for Star Admin.
//!
//! Each test spawns the full admin application on an ephemeral port, backed
//! by an [`InMemoryDataService`], and talks to it over HTTP with `reqwest`.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p star-admin-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `admin_products` - Product page, multipart create/update, delete
//! - `admin_users` - User roster and the missing-credential path
//! - `admin_chat` - Conversations, history, sending and the live stream

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use reqwest::Client;

use star_admin::config::DEFAULT_ADMIN_USER_ID;
use star_admin::data::{DataService, InMemoryDataService};
use star_admin::state::AppState;
use star_admin_core::UserId;

/// A running admin server and the backend behind it.
pub struct TestApp {
    pub base_url: String,
    pub client: Client,
    pub data: Arc<InMemoryDataService>,
    pub admin: UserId,
}

impl TestApp {
    /// Spawn the app over an empty backend.
    pub async fn spawn() -> Self {
        Self::spawn_with(InMemoryDataService::new(admin_user_id())).await
    }

    /// Spawn the app over a prepared backend.
    pub async fn spawn_with(data: InMemoryDataService) -> Self {
        // Ignore the error when another test already installed it
        let _ = rustls::crypto::ring::default_provider().install_default();

        let data = Arc::new(data);
        let admin = admin_user_id();
        let backend: Arc<dyn DataService> = data.clone();
        let app = star_admin::app(AppState::new(backend, admin));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("Failed to read local address");

        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Test server error");
        });

        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: format!("http://{addr}"),
            client,
            data,
            admin,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("Request failed")
    }
}

/// The operator identity every test app uses.
pub fn admin_user_id() -> UserId {
    DEFAULT_ADMIN_USER_ID
        .parse()
        .expect("Default admin id is a valid UUID")
}

/// A deterministic customer identity.
pub fn customer(n: u128) -> UserId {
    UserId::new(uuid::Uuid::from_u128(0xc000 + n))
}

/// Fixed reference time for seeded rows.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0)
        .single()
        .expect("Valid timestamp")
}

/// `t0` plus `minutes`.
pub fn at(minutes: i64) -> DateTime<Utc> {
    t0() + Duration::minutes(minutes)
}

/// The `Location` header of a redirect response.
pub fn location(response: &reqwest::Response) -> String {
    response
        .headers()
        .get(reqwest::header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}
