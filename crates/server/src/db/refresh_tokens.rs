//! Refresh token storage.
//!
//! Only the token id and a SHA-256 digest of the secret half are stored, so a
//! database dump cannot be replayed as sessions.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use stockroom_core::identity::RefreshToken;
use stockroom_core::{Audit, RefreshTokenId, UserId};

use super::{RepositoryError, UnitOfWork};

#[derive(sqlx::FromRow)]
struct RefreshTokenRow {
    id: RefreshTokenId,
    user_id: UserId,
    token_id: String,
    token_hash: String,
    expires_at: DateTime<Utc>,
    revoked_at: Option<DateTime<Utc>>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<RefreshTokenRow> for RefreshToken {
    fn from(row: RefreshTokenRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            token_id: row.token_id,
            token_hash: row.token_hash,
            expires_at: row.expires_at,
            revoked_at: row.revoked_at,
            audit: Audit {
                created_at: row.created_at,
                updated_at: row.updated_at,
                is_active: row.is_active,
                created_by: None,
                updated_by: None,
            },
        }
    }
}

/// Repository for refresh tokens.
pub struct RefreshTokenRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> RefreshTokenRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Store a freshly issued token.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` on a token id collision.
    pub async fn insert(&self, token: &RefreshToken) -> Result<(), RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        insert(&mut conn, token).await
    }

    /// Store a token inside an open unit of work.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` on a token id collision.
    pub async fn insert_in(
        &self,
        uow: &mut UnitOfWork,
        token: &RefreshToken,
    ) -> Result<(), RepositoryError> {
        insert(uow.conn(), token).await
    }

    /// Load a token by its public id and lock it for the rest of the transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_for_update(
        &self,
        uow: &mut UnitOfWork,
        token_id: &str,
    ) -> Result<Option<RefreshToken>, RepositoryError> {
        let row: Option<RefreshTokenRow> = sqlx::query_as(
            r"
            SELECT id, user_id, token_id, token_hash, expires_at, revoked_at,
                   is_active, created_at, updated_at
            FROM stockroom.refresh_token
            WHERE token_id = $1
            FOR UPDATE
            ",
        )
        .bind(token_id)
        .fetch_optional(uow.conn())
        .await?;

        Ok(row.map(RefreshToken::from))
    }

    /// Persist the revocation state of a token.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn save_revocation(
        &self,
        uow: &mut UnitOfWork,
        token: &RefreshToken,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            UPDATE stockroom.refresh_token
            SET revoked_at = $2, is_active = $3, updated_at = $4
            WHERE id = $1
            ",
        )
        .bind(token.id)
        .bind(token.revoked_at)
        .bind(token.audit.is_active)
        .bind(token.audit.updated_at)
        .execute(uow.conn())
        .await?;

        Ok(())
    }
}

async fn insert(
    conn: &mut sqlx::PgConnection,
    token: &RefreshToken,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        INSERT INTO stockroom.refresh_token
            (id, user_id, token_id, token_hash, expires_at, revoked_at,
             is_active, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ",
    )
    .bind(token.id)
    .bind(token.user_id)
    .bind(&token.token_id)
    .bind(&token.token_hash)
    .bind(token.expires_at)
    .bind(token.revoked_at)
    .bind(token.audit.is_active)
    .bind(token.audit.created_at)
    .bind(token.audit.updated_at)
    .execute(conn)
    .await
    .map_err(|e| RepositoryError::from_write(e, "refresh token already exists"))?;

    Ok(())
}
