//! User roster route handler.

use askama::Template;
use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use tracing::instrument;

use crate::error::AppError;
use crate::services::{RosterEntry, load_roster};
use crate::state::AppState;

use super::render_with_status;

pub fn router() -> Router<AppState> {
    Router::new().route("/users", get(index))
}

/// Users page template.
#[derive(Template)]
#[template(path = "users/index.html")]
pub struct UsersPageTemplate {
    pub current_path: String,
    pub notice: Option<String>,
    pub error: Option<String>,
    pub users: Vec<RosterEntry>,
}

/// GET /users
#[instrument(skip(state))]
async fn index(State(state): State<AppState>) -> Response {
    let mut page = UsersPageTemplate {
        current_path: "/users".to_string(),
        notice: None,
        error: None,
        users: Vec::new(),
    };

    let status = match load_roster(state.data()).await {
        Ok(users) => {
            page.users = users.iter().map(RosterEntry::from).collect();
            StatusCode::OK
        }
        Err(e) => {
            let err = AppError::from(e);
            tracing::warn!(error = %err, "Roster unavailable");
            page.error = Some(err.to_string());
            err.status()
        }
    };

    render_with_status(status, &page).into_response()
}
