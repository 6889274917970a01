//! HTTP middleware stack.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, transaction)
//! 2. `TraceLayer` (request span)
//! 3. Request ID (records `x-request-id` in the span and Sentry scope)
//! 4. Timeout
//! 5. Rate limiting on `/api/auth/*` (governor)
//!
//! Authentication is not a layer: handlers opt in with the
//! [`RequireAuth`] or [`RequireAdmin`] extractors.

pub mod auth;
pub mod rate_limit;
pub mod request_id;

pub use auth::{CurrentUser, RequireAdmin, RequireAuth};
pub use rate_limit::auth_rate_limiter;
pub use request_id::request_id_middleware;
