//! Supabase API client.
//!
//! Thin pass-through access to the four Supabase surfaces the admin panel
//! uses:
//!
//! - `rest` - `PostgREST` record queries, writes and remote procedure calls
//! - `auth` - `GoTrue` administrative user listing (service key only)
//! - `storage` - Blob upload and public URL resolution
//! - `realtime` - Phoenix websocket change subscriptions
//!
//! # Security
//!
//! The client holds the public anon key for everything except the admin
//! user listing, which is the only call made with the service role key.

pub mod auth;
pub mod realtime;
pub mod rest;
pub mod storage;

pub use rest::{Direction, Filter, Query};

use std::sync::Arc;

use reqwest::RequestBuilder;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

use crate::config::SupabaseConfig;

/// Errors that can occur when interacting with Supabase.
///
/// Remote rejections display the service's own message verbatim, since that
/// text is what the operator sees in alerts.
#[derive(Debug, Error)]
pub enum SupabaseError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("{message}")]
    Api { status: u16, message: String },

    /// Failed to parse a response body.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Websocket transport failed.
    #[error("Realtime connection error: {0}")]
    WebSocket(#[from] Box<tokio_tungstenite::tungstenite::Error>),

    /// The realtime server refused to join the channel.
    #[error("Realtime channel join rejected: {0}")]
    ChannelJoin(String),

    /// An administrative call was attempted without the service key.
    #[error("Supabase service key not configured")]
    MissingServiceKey,
}

impl From<tokio_tungstenite::tungstenite::Error> for SupabaseError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(err))
    }
}

/// Which key a request is signed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Credential {
    Anon,
    Service,
}

/// Supabase API client.
///
/// Cheap to clone; all clones share one connection pool.
#[derive(Clone)]
pub struct SupabaseClient {
    inner: Arc<SupabaseClientInner>,
}

struct SupabaseClientInner {
    http: reqwest::Client,
    /// Project URL without trailing slash
    base_url: String,
    anon_key: SecretString,
    service_key: Option<SecretString>,
}

/// Error body shapes used across `PostgREST`, `GoTrue` and Storage.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    msg: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
}

impl ErrorBody {
    fn into_message(self) -> Option<String> {
        self.message
            .or(self.msg)
            .or(self.error_description)
            .or(self.error)
    }
}

impl SupabaseClient {
    /// Create a new Supabase client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &SupabaseConfig) -> Result<Self, SupabaseError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("star-admin/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            inner: Arc::new(SupabaseClientInner {
                http,
                base_url: config.url.as_str().trim_end_matches('/').to_string(),
                anon_key: config.anon_key.clone(),
                service_key: config.service_key.clone(),
            }),
        })
    }

    /// Project base URL without trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// Whether the service role key is available.
    #[must_use]
    pub fn has_service_key(&self) -> bool {
        self.inner.service_key.is_some()
    }

    pub(crate) fn anon_key(&self) -> &SecretString {
        &self.inner.anon_key
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{path}", self.inner.base_url)
    }

    /// Build an endpoint URL with percent-encoded query parameters.
    pub(crate) fn url_with_params(
        &self,
        path: &str,
        params: &[(String, String)],
    ) -> Result<String, SupabaseError> {
        url::Url::parse_with_params(&self.url(path), params)
            .map(String::from)
            .map_err(|e| SupabaseError::Parse(format!("Invalid request URL: {e}")))
    }

    /// Start a request signed with the given credential.
    fn request(
        &self,
        method: reqwest::Method,
        url: String,
        credential: Credential,
    ) -> Result<RequestBuilder, SupabaseError> {
        let key = match credential {
            Credential::Anon => &self.inner.anon_key,
            Credential::Service => self
                .inner
                .service_key
                .as_ref()
                .ok_or(SupabaseError::MissingServiceKey)?,
        };

        Ok(self
            .inner
            .http
            .request(method, url)
            .header("apikey", key.expose_secret())
            .bearer_auth(key.expose_secret()))
    }

    /// Send a request and turn non-success statuses into `SupabaseError::Api`.
    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response, SupabaseError> {
        let response = request.send().await?;

        if response.status().is_success() {
            return Ok(response);
        }

        Err(Self::parse_error(response).await)
    }

    /// Send a request and parse the JSON response body.
    async fn send_json<T: serde::de::DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, SupabaseError> {
        let response = self.send(request).await?;
        response
            .json()
            .await
            .map_err(|e| SupabaseError::Parse(format!("Failed to parse response: {e}")))
    }

    /// Parse an error response into the service's own message.
    async fn parse_error(response: reqwest::Response) -> SupabaseError {
        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();
        let message = error_message(status, &text);

        tracing::warn!(status, %message, "Supabase request rejected");
        SupabaseError::Api { status, message }
    }
}

/// Extract a human readable message from an error body.
fn error_message(status: u16, body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(ErrorBody::into_message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                format!("Request failed with status {status}")
            } else {
                trimmed.to_string()
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_postgrest_shape() {
        let body = r#"{"code":"23502","details":null,"hint":null,"message":"null value in column \"name\""}"#;
        assert_eq!(error_message(400, body), "null value in column \"name\"");
    }

    #[test]
    fn test_error_message_gotrue_shape() {
        let body = r#"{"code":403,"msg":"User not allowed"}"#;
        assert_eq!(error_message(403, body), "User not allowed");
    }

    #[test]
    fn test_error_message_storage_shape() {
        let body = r#"{"statusCode":"409","error":"Duplicate","message":"The resource already exists"}"#;
        assert_eq!(error_message(409, body), "The resource already exists");
    }

    #[test]
    fn test_error_message_plain_text_and_empty() {
        assert_eq!(error_message(502, "Bad Gateway"), "Bad Gateway");
        assert_eq!(error_message(500, ""), "Request failed with status 500");
    }

    #[test]
    fn test_api_error_displays_message_verbatim() {
        let err = SupabaseError::Api {
            status: 401,
            message: "Invalid API key".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid API key");
    }
}
