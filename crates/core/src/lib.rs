//! Stockroom Core - domain model and inventory engines.
//!
//! This crate holds everything about the catalogue that can be decided
//! without I/O:
//! - [`catalog`] - products, option matrices, variants, and the build/update engines
//! - [`bundles`] - bundle composition, reconciliation, and read-side summaries
//! - [`orders`] - order aggregates and the stock ledger used at checkout
//! - [`identity`] - user accounts and refresh tokens
//!
//! # Architecture
//!
//! Engines are synchronous and operate on in-memory aggregates. The server
//! crate loads rows (locking them where stock is involved), hands them to an
//! engine, and persists the result inside the same transaction. The
//! `postgres` feature adds `sqlx` encode/decode impls for the id and value
//! types.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod audit;
pub mod bundles;
pub mod catalog;
pub mod identity;
pub mod orders;
pub mod types;
pub mod validation;

pub use audit::Audit;
pub use types::*;
pub use validation::{FieldError, ValidationErrors};
