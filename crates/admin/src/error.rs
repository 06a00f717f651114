//! Unified error handling for admin.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::services::{ChatError, ConversationError, ProductError, RosterError};

/// Application-level error type for the admin panel.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Products(#[from] ProductError),

    #[error(transparent)]
    Roster(#[from] RosterError),

    #[error(transparent)]
    Conversations(#[from] ConversationError),

    #[error(transparent)]
    Chat(#[from] ChatError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Products(ProductError::Validation(_))
            | Self::Chat(ChatError::EmptyMessage | ChatError::NoConversationSelected) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::Roster(e) if e.is_configuration() => StatusCode::SERVICE_UNAVAILABLE,
            Self::Conversations(e) if e.is_configuration() => StatusCode::SERVICE_UNAVAILABLE,
            Self::Products(_) | Self::Roster(_) | Self::Conversations(_) | Self::Chat(_) => {
                StatusCode::BAD_GATEWAY
            }
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Log server errors with Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Admin request error"
            );
        }

        // Remote messages are shown verbatim; internal details are not.
        let message = match &self {
            Self::Internal(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
