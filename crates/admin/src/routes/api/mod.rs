//! API route handlers for admin.
//!
//! JSON mirrors of the product, user and conversation views.

use axum::{Json, Router, extract::State, routing::get};
use tracing::instrument;

use star_admin_core::{Conversation, Product, User};

use crate::error::AppError;
use crate::services::{ProductService, load_conversations, load_roster};
use crate::state::AppState;

/// Build the complete API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/products", get(products))
        .route("/users", get(users))
        .route("/conversations", get(conversations))
}

/// GET /api/products
#[instrument(skip(state))]
async fn products(State(state): State<AppState>) -> Result<Json<Vec<Product>>, AppError> {
    Ok(Json(ProductService::new(state.data()).list().await?))
}

/// GET /api/users
#[instrument(skip(state))]
async fn users(State(state): State<AppState>) -> Result<Json<Vec<User>>, AppError> {
    Ok(Json(load_roster(state.data()).await?))
}

/// GET /api/conversations
#[instrument(skip(state))]
async fn conversations(
    State(state): State<AppState>,
) -> Result<Json<Vec<Conversation>>, AppError> {
    Ok(Json(load_conversations(state.data()).await?))
}
