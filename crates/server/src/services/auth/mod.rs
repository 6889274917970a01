//! Authentication service.
//!
//! Registration, password login, refresh-token rotation, and logout. Access
//! tokens are stateless; refresh tokens are stored (hashed) and revoked on
//! every use.

mod error;
pub mod tokens;

pub use error::AuthError;
pub use tokens::{Claims, TokenService};

use argon2::{
    Argon2,
    password_hash::{
        PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString, rand_core::OsRng,
    },
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{info, warn};

use stockroom_core::identity::{RefreshToken, User};
use stockroom_core::{Email, Role, UserId};

use crate::db::{RefreshTokenRepository, RepositoryError, UnitOfWork, UserRepository};
use tokens::{constant_time_compare, hash_secret, split_refresh_token};

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

// =============================================================================
// Password hashing
// =============================================================================

/// Pluggable password hashing.
pub trait PasswordHasher: Send + Sync {
    /// Produce a self-describing hash string.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::PasswordHash` if hashing fails.
    fn hash(&self, password: &str) -> Result<String, AuthError>;

    /// Check `password` against a hash produced by [`PasswordHasher::hash`].
    ///
    /// # Errors
    ///
    /// Returns `AuthError::PasswordHash` if the stored hash cannot be parsed.
    fn verify(&self, password: &str, hash: &str) -> Result<bool, AuthError>;
}

/// Argon2id with the crate's default parameters.
#[derive(Debug, Default, Clone, Copy)]
pub struct Argon2Hasher;

impl PasswordHasher for Argon2Hasher {
    fn hash(&self, password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|_| AuthError::PasswordHash)
    }

    fn verify(&self, password: &str, hash: &str) -> Result<bool, AuthError> {
        let parsed = PasswordHash::new(hash).map_err(|_| AuthError::PasswordHash)?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }
}

/// Validate password meets minimum requirements.
///
/// # Errors
///
/// Returns `AuthError::WeakPassword` if the password is too short.
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

// =============================================================================
// Requests and responses
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Tokens handed to the client after login or refresh.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}

// =============================================================================
// Service
// =============================================================================

/// Authentication service.
pub struct AuthService<'a> {
    pool: &'a PgPool,
    users: UserRepository<'a>,
    refresh_tokens: RefreshTokenRepository<'a>,
    tokens: &'a TokenService,
    hasher: &'a dyn PasswordHasher,
}

impl<'a> AuthService<'a> {
    #[must_use]
    pub const fn new(
        pool: &'a PgPool,
        tokens: &'a TokenService,
        hasher: &'a dyn PasswordHasher,
    ) -> Self {
        Self {
            pool,
            users: UserRepository::new(pool),
            refresh_tokens: RefreshTokenRepository::new(pool),
            tokens,
            hasher,
        }
    }

    /// Create an account with role `User` unless another role is given.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
    /// Returns `AuthError::MissingName` if a name is blank.
    /// Returns `AuthError::UserAlreadyExists` if the email is already registered.
    pub async fn register(&self, request: &RegisterRequest, role: Role) -> Result<User, AuthError> {
        let email = Email::parse(&request.email)?;
        validate_password(&request.password)?;
        if request.first_name.trim().is_empty() {
            return Err(AuthError::MissingName("firstName"));
        }
        if request.last_name.trim().is_empty() {
            return Err(AuthError::MissingName("lastName"));
        }

        let password_hash = self.hasher.hash(&request.password)?;
        let user = User::new(
            email,
            password_hash,
            &request.first_name,
            &request.last_name,
            role,
        );

        self.users.create(&user).await.map_err(|e| match e {
            RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
            other => AuthError::Repository(other),
        })?;

        info!(user_id = %user.id, role = %user.role, "User registered");
        Ok(user)
    }

    /// Check credentials and issue a token pair.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    pub async fn login(&self, request: &LoginRequest) -> Result<TokenPair, AuthError> {
        let Ok(email) = Email::parse(&request.email) else {
            return Err(AuthError::InvalidCredentials);
        };

        let user = self
            .users
            .get_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !self.hasher.verify(&request.password, &user.password_hash)? {
            warn!(user_id = %user.id, "Failed login attempt");
            return Err(AuthError::InvalidCredentials);
        }

        let refresh = self.tokens.new_refresh_token();
        let stored = RefreshToken::issue(
            user.id,
            refresh.token_id,
            refresh.token_hash,
            self.tokens.refresh_ttl(),
        );
        self.refresh_tokens.insert(&stored).await?;

        info!(user_id = %user.id, "User logged in");
        Ok(TokenPair {
            access_token: self.tokens.issue_access(&user, Utc::now())?,
            refresh_token: refresh.token,
            expires_in: self.tokens.access_ttl_secs(),
        })
    }

    /// Exchange a refresh token for a new pair, revoking the presented one.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` if the token is unknown, revoked,
    /// expired, or its secret does not match.
    pub async fn refresh(&self, request: &RefreshRequest) -> Result<TokenPair, AuthError> {
        let (token_id, secret) = split_refresh_token(&request.refresh_token)?;
        let now = Utc::now();

        let mut uow = UnitOfWork::begin(self.pool).await?;
        let mut stored = self
            .refresh_tokens
            .get_for_update(&mut uow, token_id)
            .await?
            .ok_or(AuthError::InvalidToken("unknown refresh token"))?;

        if !constant_time_compare(&hash_secret(secret), &stored.token_hash) {
            warn!(token_id, "Refresh token secret mismatch");
            return Err(AuthError::InvalidToken("unknown refresh token"));
        }
        if !stored.is_active_at(now) {
            return Err(AuthError::InvalidToken("refresh token expired or revoked"));
        }

        let user = self
            .users
            .get_by_id(stored.user_id)
            .await?
            .ok_or(AuthError::InvalidToken("unknown user"))?;

        stored.revoke(now);
        self.refresh_tokens
            .save_revocation(&mut uow, &stored)
            .await?;

        let refresh = self.tokens.new_refresh_token();
        let next = RefreshToken::issue(
            user.id,
            refresh.token_id,
            refresh.token_hash,
            self.tokens.refresh_ttl(),
        );
        self.refresh_tokens.insert_in(&mut uow, &next).await?;
        uow.commit().await?;

        info!(user_id = %user.id, "Refresh token rotated");
        Ok(TokenPair {
            access_token: self.tokens.issue_access(&user, now)?,
            refresh_token: refresh.token,
            expires_in: self.tokens.access_ttl_secs(),
        })
    }

    /// Revoke a refresh token. Unknown or already revoked tokens are ignored.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` if the token is malformed.
    pub async fn logout(&self, request: &RefreshRequest) -> Result<(), AuthError> {
        let (token_id, secret) = split_refresh_token(&request.refresh_token)?;

        let mut uow = UnitOfWork::begin(self.pool).await?;
        let Some(mut stored) = self.refresh_tokens.get_for_update(&mut uow, token_id).await? else {
            return Ok(());
        };
        if !constant_time_compare(&hash_secret(secret), &stored.token_hash) {
            return Ok(());
        }

        if stored.revoke(Utc::now()) {
            self.refresh_tokens
                .save_revocation(&mut uow, &stored)
                .await?;
            uow.commit().await?;
            info!(user_id = %stored.user_id, "User logged out");
        }
        Ok(())
    }

    /// The account behind an authenticated request.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` if the account no longer exists.
    pub async fn me(&self, user_id: UserId) -> Result<User, AuthError> {
        self.users
            .get_by_id(user_id)
            .await?
            .ok_or(AuthError::InvalidToken("unknown user"))
    }
}

/// User fields safe to return to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: UserId,
    pub email: Email,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub created_at: chrono::DateTime<Utc>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            role: user.role,
            created_at: user.audit.created_at,
        }
    }
}
