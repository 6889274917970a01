//! Access and refresh token mechanics.
//!
//! Access tokens are HS256 JWTs signed with `jsonwebtoken`. Verification
//! pins the algorithm and issuer and enforces `exp` with no leeway.
//!
//! Refresh tokens are `"{token_id}.{secret}"`. Only `token_id` and the hex
//! SHA-256 of `secret` are stored.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use stockroom_core::identity::User;
use stockroom_core::{Role, UserId};

use super::AuthError;
use crate::config::AuthConfig;

/// Random bytes in each half of a refresh token.
const REFRESH_PART_BYTES: usize = 32;

/// Claims carried by an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: UserId,
    pub email: String,
    pub role: Role,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

/// A newly minted refresh token: the string for the client and what to store.
#[derive(Debug)]
pub struct IssuedRefreshToken {
    pub token: String,
    pub token_id: String,
    pub token_hash: String,
}

/// Signs and verifies tokens with the configured key.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
    access_ttl: chrono::Duration,
    refresh_ttl: chrono::Duration,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("keys", &"[REDACTED]")
            .field("issuer", &self.issuer)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    /// # Errors
    ///
    /// Returns `AuthError::Signing` if a configured lifetime does not fit a
    /// `chrono::Duration`.
    pub fn new(config: &AuthConfig) -> Result<Self, AuthError> {
        let secret = config.jwt_secret.expose_secret().as_bytes();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[config.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation.validate_aud = false;
        validation.leeway = 0;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            issuer: config.issuer.clone(),
            access_ttl: chrono::Duration::from_std(config.access_token_ttl)
                .map_err(|_| AuthError::Signing)?,
            refresh_ttl: chrono::Duration::from_std(config.refresh_token_ttl)
                .map_err(|_| AuthError::Signing)?,
        })
    }

    /// Access token lifetime in seconds, as reported to clients.
    #[must_use]
    pub fn access_ttl_secs(&self) -> i64 {
        self.access_ttl.num_seconds()
    }

    #[must_use]
    pub const fn refresh_ttl(&self) -> chrono::Duration {
        self.refresh_ttl
    }

    /// Sign an access token for `user`, valid from `now`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Signing` if the claims cannot be encoded.
    pub fn issue_access(&self, user: &User, now: DateTime<Utc>) -> Result<String, AuthError> {
        let claims = Claims {
            sub: user.id,
            email: user.email.as_str().to_owned(),
            role: user.role,
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            exp: (now + self.access_ttl).timestamp(),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|_| AuthError::Signing)
    }

    /// Verify an access token's signature, algorithm, issuer, and expiry
    /// against the current time.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` for any malformed, forged, or
    /// expired token.
    pub fn verify_access(&self, token: &str) -> Result<Claims, AuthError> {
        jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|err| {
                AuthError::InvalidToken(match err.kind() {
                    ErrorKind::ExpiredSignature => "expired",
                    ErrorKind::InvalidSignature => "bad signature",
                    ErrorKind::InvalidIssuer => "wrong issuer",
                    ErrorKind::InvalidAlgorithm => "unsupported algorithm",
                    _ => "malformed",
                })
            })
    }

    /// Mint a refresh token.
    #[must_use]
    pub fn new_refresh_token(&self) -> IssuedRefreshToken {
        let token_id = random_part();
        let secret = random_part();
        IssuedRefreshToken {
            token: format!("{token_id}.{secret}"),
            token_hash: hash_secret(&secret),
            token_id,
        }
    }
}

fn random_part() -> String {
    let mut bytes = [0u8; REFRESH_PART_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Hex SHA-256 of a refresh token secret.
#[must_use]
pub fn hash_secret(secret: &str) -> String {
    hex::encode(Sha256::digest(secret.as_bytes()))
}

/// Split a presented refresh token into `(token_id, secret)`.
///
/// # Errors
///
/// Returns `AuthError::InvalidToken` unless the token has exactly two
/// non-empty parts.
pub fn split_refresh_token(token: &str) -> Result<(&str, &str), AuthError> {
    match token.trim().split_once('.') {
        Some((id, secret)) if !id.is_empty() && !secret.is_empty() && !secret.contains('.') => {
            Ok((id, secret))
        }
        _ => Err(AuthError::InvalidToken("malformed refresh token")),
    }
}

/// Constant-time string comparison to prevent timing attacks.
#[must_use]
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}
