//! Star Admin library.
//!
//! This crate provides the admin panel as a library, allowing it to be
//! tested and reused by the CLI.
//!
//! # Security
//!
//! The panel has no login of its own; access control lives entirely on the
//! Supabase side. Bind it to a private interface.
//!
//! The service role key, when configured, grants full access to the auth
//! admin API and is used only for the user listing.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod data;
pub mod error;
pub mod routes;
pub mod services;
pub mod state;
pub mod subscription;
pub mod supabase;

use std::sync::Arc;

use axum::Router;
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use config::AdminConfig;
use data::{DataService, SupabaseDataService};
use state::AppState;
use supabase::{SupabaseClient, SupabaseError};

/// Build the Supabase-backed data service for a configuration.
///
/// # Errors
///
/// Returns `SupabaseError` if the HTTP client cannot be built.
pub fn supabase_data_service(config: &AdminConfig) -> Result<Arc<dyn DataService>, SupabaseError> {
    let client = SupabaseClient::new(&config.supabase)?;
    if !client.has_service_key() {
        tracing::warn!("SUPABASE_SERVICE_KEY not set; user listing and conversations will be unavailable");
    }
    Ok(Arc::new(SupabaseDataService::new(
        client,
        config.product_image_bucket.clone(),
    )))
}

/// The complete application: routes, request tracing and Sentry layers.
pub fn app(state: AppState) -> Router {
    routes::routes()
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}
