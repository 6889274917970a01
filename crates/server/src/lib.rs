//! Stockroom Server library.
//!
//! REST API over the catalogue, bundle, and order engines in
//! `stockroom-core`. Exposed as a library so the integration tests and the
//! CLI can build the router and reuse the repositories.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod response;
pub mod routes;
pub mod services;
pub mod state;

use axum::{Router, body::Body, http::Request};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use state::AppState;

/// Build the application router with the full middleware stack.
///
/// Path normalization is applied by the caller around the returned router,
/// since it must run before routing.
pub fn app(state: AppState) -> Router {
    let timeout = state.config().request_timeout;

    routes::routes()
        .with_state(state)
        .layer(TimeoutLayer::new(timeout))
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                )
            }),
        )
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
        .layer(sentry_tower::NewSentryLayer::new_from_top())
}
