//! HTTP route handlers for admin.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                       - Health check
//! GET  /                             - Redirect to /products
//!
//! # Products
//! GET  /products                     - Product form and list
//! GET  /products/{id}/edit           - Product list with the edit form filled in
//! POST /products                     - Create (multipart)
//! POST /products/{id}                - Update (multipart)
//! POST /products/{id}/delete         - Delete
//!
//! # Users
//! GET  /users                        - Registered accounts
//!
//! # Chat
//! GET  /chat                         - Conversations; ?user=<uuid> opens one
//! GET  /chat/{user_id}/stream        - SSE: `history` then `message` events
//! POST /chat/{user_id}/messages      - Send (form or JSON)
//!
//! # JSON API
//! GET  /api/products
//! GET  /api/users
//! GET  /api/conversations
//! ```

pub mod api;
pub mod chat;
pub mod products;
pub mod users;

use askama::Template;
use axum::{
    Router,
    http::StatusCode,
    response::{Html, Redirect},
    routing::get,
};
use serde::Deserialize;

use crate::state::AppState;

/// Banner messages carried through a redirect-after-post.
#[derive(Debug, Default, Deserialize)]
pub struct Alerts {
    pub notice: Option<String>,
    pub error: Option<String>,
}

/// Build the admin router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/", get(|| async { Redirect::to("/products") }))
        .merge(products::router())
        .merge(users::router())
        .merge(chat::router())
        .nest("/api", api::router())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Render a page template, logging render failures.
pub(crate) fn render<T: Template>(template: &T) -> Html<String> {
    Html(template.render().unwrap_or_else(|e| {
        tracing::error!("Template render error: {}", e);
        "Internal Server Error".to_string()
    }))
}

/// Render a page template with an explicit status.
pub(crate) fn render_with_status<T: Template>(
    status: StatusCode,
    template: &T,
) -> (StatusCode, Html<String>) {
    (status, render(template))
}

/// Redirect to `path` with a banner message.
pub(crate) fn redirect_with(path: &str, key: &str, message: &str) -> Redirect {
    let separator = if path.contains('?') { '&' } else { '?' };
    Redirect::to(&format!(
        "{path}{separator}{key}={}",
        urlencoding::encode(message)
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;
    use tower::ServiceExt;

    fn location(redirect: Redirect) -> String {
        redirect
            .into_response()
            .headers()
            .get("location")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    }

    #[test]
    fn test_redirect_with_encodes_message() {
        let to = location(redirect_with("/products", "notice", "Product added successfully!"));
        assert_eq!(to, "/products?notice=Product%20added%20successfully%21");
    }

    #[test]
    fn test_redirect_with_existing_query() {
        let to = location(redirect_with("/chat?user=abc", "error", "x"));
        assert_eq!(to, "/chat?user=abc&error=x");
    }

    fn app() -> Router {
        let admin = crate::config::DEFAULT_ADMIN_USER_ID.parse().unwrap();
        let data = std::sync::Arc::new(crate::data::InMemoryDataService::new(admin));
        crate::app(AppState::new(data, admin))
    }

    fn get(uri: &str) -> axum::http::Request<axum::body::Body> {
        axum::http::Request::builder()
            .uri(uri)
            .body(axum::body::Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = app().oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_root_redirects_to_products() {
        let response = app().oneshot(get("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()["location"], "/products");
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let response = app().oneshot(get("/orders")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
