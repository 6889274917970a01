//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                 - Liveness
//! GET    /health/ready           - Readiness (database ping)
//!
//! # Auth (rate limited)
//! POST   /api/auth/register      - Create an account
//! POST   /api/auth/login         - Issue a token pair
//! POST   /api/auth/refresh       - Rotate a refresh token
//! POST   /api/auth/logout        - Revoke a refresh token
//! GET    /api/users/me           - Current account
//!
//! # Catalogue (reads public, writes admin)
//! GET    /api/products           - List products
//! POST   /api/products           - Create product
//! GET    /api/products/{id}      - Product detail
//! PUT    /api/products/{id}      - Update product
//! DELETE /api/products/{id}      - Delete product
//! GET    /api/bundles            - List bundles
//! POST   /api/bundles            - Create bundle
//! GET    /api/bundles/{id}       - Bundle detail
//! PUT    /api/bundles/{id}       - Update bundle
//! DELETE /api/bundles/{id}       - Delete bundle
//!
//! # Orders (requires auth)
//! POST   /api/orders             - Place order
//! GET    /api/orders             - Caller's orders
//! GET    /api/orders/{id}        - Order detail
//! ```

pub mod auth;
pub mod bundles;
pub mod orders;
pub mod products;
pub mod users;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};

use crate::middleware::auth_rate_limiter;
use crate::state::AppState;

/// All routes, without the outer middleware stack.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .nest("/api/auth", auth_routes())
        .route("/api/users/me", get(users::me))
        .nest("/api/products", product_routes())
        .nest("/api/bundles", bundle_routes())
        .nest("/api/orders", order_routes())
}

/// Auth routes, rate limited per client IP.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh))
        .route("/logout", post(auth::logout))
        .layer(auth_rate_limiter())
}

pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::list).post(products::create))
        .route(
            "/{id}",
            get(products::get)
                .put(products::update)
                .delete(products::delete),
        )
}

pub fn bundle_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(bundles::list).post(bundles::create))
        .route(
            "/{id}",
            get(bundles::get).put(bundles::update).delete(bundles::delete),
        )
}

pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::list_mine).post(orders::create))
        .route("/{id}", get(orders::get))
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}
