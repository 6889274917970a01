//! Database access for the `stockroom` schema.
//!
//! # Tables
//!
//! - `user`, `refresh_token` - accounts and session tokens
//! - `product`, `variant_option`, `variant_option_value`, `variant`,
//!   `product_variant_combination` - the catalogue
//! - `bundle`, `bundle_item` - bundles
//! - `order`, `order_item` - orders
//!
//! Reads go through the pool. Writes go through a [`UnitOfWork`], which owns
//! one transaction; dropping it without calling [`UnitOfWork::commit`] rolls
//! everything back.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p stockroom-cli -- migrate
//! ```

pub mod bundles;
pub mod orders;
pub mod products;
pub mod refresh_tokens;
pub mod users;

use std::time::Duration;

use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use thiserror::Error;

use stockroom_core::{Audit, UserId};

pub use bundles::BundleRepository;
pub use orders::OrderRepository;
pub use products::ProductRepository;
pub use refresh_tokens::RefreshTokenRepository;
pub use users::UserRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map a unique-violation to [`RepositoryError::Conflict`], anything else
    /// to [`RepositoryError::Database`].
    pub(crate) fn from_write(err: sqlx::Error, conflict: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = err
            && db_err.is_unique_violation()
        {
            return Self::Conflict(conflict.to_owned());
        }
        Self::Database(err)
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(
    database_url: &secrecy::SecretString,
    max_connections: u32,
) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

// =============================================================================
// Unit of work
// =============================================================================

/// One database transaction spanning every write of a request.
pub struct UnitOfWork {
    tx: Transaction<'static, Postgres>,
}

impl UnitOfWork {
    /// Open a transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if no connection can be acquired.
    pub async fn begin(pool: &PgPool) -> Result<Self, RepositoryError> {
        Ok(Self {
            tx: pool.begin().await?,
        })
    }

    /// The connection the transaction runs on.
    pub fn conn(&mut self) -> &mut PgConnection {
        &mut self.tx
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the commit fails.
    pub async fn commit(self) -> Result<(), RepositoryError> {
        self.tx.commit().await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the rollback fails.
    pub async fn rollback(self) -> Result<(), RepositoryError> {
        self.tx.rollback().await?;
        Ok(())
    }
}

// =============================================================================
// Shared row mapping
// =============================================================================

/// Audit columns shared by every table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct AuditColumns {
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<UserId>,
    pub updated_by: Option<UserId>,
}

impl From<AuditColumns> for Audit {
    fn from(row: AuditColumns) -> Self {
        Self {
            created_at: row.created_at,
            updated_at: row.updated_at,
            is_active: row.is_active,
            created_by: row.created_by,
            updated_by: row.updated_by,
        }
    }
}

/// Column list matching [`AuditColumns`].
pub(crate) const AUDIT_COLUMNS: &str = "is_active, created_at, updated_at, created_by, updated_by";
