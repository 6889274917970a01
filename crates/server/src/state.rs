//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::ServerConfig;
use crate::services::auth::{Argon2Hasher, AuthError, PasswordHasher, TokenService};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    pool: PgPool,
    tokens: TokenService,
    hasher: Box<dyn PasswordHasher>,
}

impl AppState {
    /// Create a new application state with the Argon2 password hasher.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Signing` if the token settings are unusable.
    pub fn new(config: ServerConfig, pool: PgPool) -> Result<Self, AuthError> {
        Self::with_hasher(config, pool, Box::new(Argon2Hasher))
    }

    /// Create a new application state with a custom password hasher.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Signing` if the token settings are unusable.
    pub fn with_hasher(
        config: ServerConfig,
        pool: PgPool,
        hasher: Box<dyn PasswordHasher>,
    ) -> Result<Self, AuthError> {
        let tokens = TokenService::new(&config.auth)?;
        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                tokens,
                hasher,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenService {
        &self.inner.tokens
    }

    #[must_use]
    pub fn hasher(&self) -> &dyn PasswordHasher {
        self.inner.hasher.as_ref()
    }
}
