//! Business logic between the HTTP handlers and the repositories.

pub mod auth;
pub mod bundles;
pub mod orders;
pub mod products;
