//! Admin-to-customer chat route handlers.
//!
//! The page is rendered server-side with the selected conversation's history,
//! read without subscribing; live updates then arrive over SSE from a per-connection
//! [`MessageSynchronizer`], whose subscription is released when the client
//! disconnects.

use std::convert::Infallible;
use std::str::FromStr;

use askama::Template;
use axum::response::sse::{Event, KeepAlive};
use axum::{
    Form, Json, Router,
    extract::{FromRequest, Path, Query, Request, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response, Sse},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use star_admin_core::{Conversation, Message, UNKNOWN_USER_LABEL, UserId};

use crate::data::DataService;
use crate::error::AppError;
use crate::services::{
    ChatError, MessageSynchronizer, format_timestamp, load_conversations, send_message,
};
use crate::state::AppState;

use super::{redirect_with, render_with_status};

/// Build the chat router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/chat", get(chat_page))
        .route("/chat/{user_id}/stream", get(stream))
        .route("/chat/{user_id}/messages", post(send))
}

// =============================================================================
// View Types
// =============================================================================

/// Sidebar entry.
#[derive(Debug, Clone)]
pub struct ConversationView {
    pub user_id: String,
    pub email: String,
    pub last_message_time: String,
    pub active: bool,
}

/// A message bubble, also the SSE payload.
#[derive(Debug, Clone, Serialize)]
pub struct MessageView {
    pub id: i64,
    pub content: String,
    /// Sent by the admin (as opposed to received from the customer).
    pub sent: bool,
    pub created_at: String,
}

impl MessageView {
    fn new(message: &Message, admin: UserId) -> Self {
        Self {
            id: message.id.get(),
            content: message.content.clone(),
            sent: message.is_from(admin),
            created_at: format_timestamp(message.created_at),
        }
    }
}

/// The open conversation.
#[derive(Debug, Clone)]
pub struct SelectedView {
    pub user_id: String,
    pub email: String,
    pub messages: Vec<MessageView>,
}

/// Chat page template.
#[derive(Template)]
#[template(path = "chat/index.html")]
pub struct ChatPageTemplate {
    pub current_path: String,
    pub notice: Option<String>,
    pub error: Option<String>,
    pub conversations: Vec<ConversationView>,
    pub selected: Option<SelectedView>,
}

/// Query parameters for the chat page.
#[derive(Debug, Default, Deserialize)]
pub struct ChatQuery {
    pub user: Option<String>,
    pub notice: Option<String>,
    pub error: Option<String>,
}

/// Request body for sending a message.
#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

// =============================================================================
// Route Handlers
// =============================================================================

/// Render the chat page.
///
/// GET /chat
#[instrument(skip(state))]
async fn chat_page(State(state): State<AppState>, Query(query): Query<ChatQuery>) -> Response {
    let admin = state.admin_user_id();
    let mut status = StatusCode::OK;
    let mut errors: Vec<String> = query.error.into_iter().collect();

    let selected_id = match query.user.as_deref().filter(|u| !u.trim().is_empty()) {
        Some(raw) => match UserId::from_str(raw) {
            Ok(id) => Some(id),
            Err(_) => {
                errors.push(format!("Invalid user id: {raw}"));
                status = StatusCode::BAD_REQUEST;
                None
            }
        },
        None => None,
    };

    let conversations: Vec<Conversation> = match load_conversations(state.data()).await {
        Ok(conversations) => conversations,
        Err(e) => {
            let err = AppError::from(e);
            tracing::warn!(error = %err, "Conversations unavailable");
            status = err.status();
            errors.push(err.to_string());
            Vec::new()
        }
    };

    let selected = match selected_id {
        Some(counterpart) => {
            let history = state
                .data()
                .conversation_messages(admin, counterpart)
                .await
                .map_err(ChatError::History);
            let messages: Vec<MessageView> = match history {
                Ok(history) => history.iter().map(|m| MessageView::new(m, admin)).collect(),
                Err(e) => {
                    let err = AppError::from(e);
                    status = err.status();
                    errors.push(err.to_string());
                    Vec::new()
                }
            };
            let email = conversations
                .iter()
                .find(|c| c.user_id == counterpart)
                .map_or_else(|| UNKNOWN_USER_LABEL.to_string(), |c| c.email.clone());
            Some(SelectedView {
                user_id: counterpart.to_string(),
                email,
                messages,
            })
        }
        None => None,
    };

    let page = ChatPageTemplate {
        current_path: "/chat".to_string(),
        notice: query.notice,
        error: (!errors.is_empty()).then(|| errors.join(" ")),
        conversations: conversations
            .iter()
            .map(|c| ConversationView {
                user_id: c.user_id.to_string(),
                email: c.email.clone(),
                last_message_time: format_timestamp(c.last_message_time),
                active: selected_id == Some(c.user_id),
            })
            .collect(),
        selected,
    };

    render_with_status(status, &page).into_response()
}

fn json_event<T: Serialize>(name: &str, payload: &T) -> Event {
    Event::default()
        .event(name)
        .json_data(payload)
        .unwrap_or_else(|_| Event::default().event("error").data("Failed to serialize event"))
}

/// Stream a conversation: one `history` event, then a `message` event per
/// accepted insert.
///
/// GET /chat/{user_id}/stream
#[instrument(skip(state))]
async fn stream(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> Sse<impl futures::Stream<Item = Result<Event, Infallible>>> {
    let data = state.data_handle();
    let admin = state.admin_user_id();

    let events = async_stream::stream! {
        let mut sync = MessageSynchronizer::new(data, admin);

        let history = match sync.select(user_id).await {
            Ok(history) => history
                .iter()
                .map(|m| MessageView::new(m, admin))
                .collect::<Vec<_>>(),
            Err(e) => {
                yield Ok(Event::default().event("error").data(e.to_string()));
                return;
            }
        };
        yield Ok(json_event("history", &history));

        while let Some(message) = sync.next_message().await {
            yield Ok(json_event("message", &MessageView::new(&message, admin)));
        }

        tracing::info!(%user_id, "Conversation stream ended");
    };

    Sse::new(events).keep_alive(KeepAlive::default())
}

/// Send a message to a customer.
///
/// POST /chat/{user_id}/messages
///
/// Accepts a JSON body (`{"content": ...}`, answered with 202 or a JSON
/// error) or a form post (answered with a redirect back to the chat page).
#[instrument(skip(state, request))]
async fn send(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    request: Request,
) -> Response {
    let is_json = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"));

    if is_json {
        let body = match Json::<SendMessageRequest>::from_request(request, &state).await {
            Ok(Json(body)) => body,
            Err(rejection) => return AppError::BadRequest(rejection.body_text()).into_response(),
        };
        return match send_message(state.data(), state.admin_user_id(), user_id, &body.content).await
        {
            Ok(()) => StatusCode::ACCEPTED.into_response(),
            Err(e) => AppError::from(e).into_response(),
        };
    }

    let back = format!("/chat?user={user_id}");
    let body = match Form::<SendMessageRequest>::from_request(request, &state).await {
        Ok(Form(body)) => body,
        Err(rejection) => return redirect_with(&back, "error", &rejection.body_text()).into_response(),
    };

    match send_message(state.data(), state.admin_user_id(), user_id, &body.content).await {
        Ok(()) => axum::response::Redirect::to(&back).into_response(),
        Err(e) => redirect_with(&back, "error", &e.to_string()).into_response(),
    }
}
