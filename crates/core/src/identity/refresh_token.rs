//! Stored refresh tokens.
//!
//! Only the lookup id and a hash of the secret are persisted; the secret
//! itself exists solely in the token handed to the client.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::audit::Audit;
use crate::types::{RefreshTokenId, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshToken {
    pub id: RefreshTokenId,
    pub user_id: UserId,
    /// Random public lookup key (the part before the dot).
    pub token_id: String,
    /// Hex SHA-256 of the secret part.
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub audit: Audit,
}

impl RefreshToken {
    #[must_use]
    pub fn issue(user_id: UserId, token_id: String, token_hash: String, ttl: Duration) -> Self {
        let audit = Audit::new(Some(user_id));
        Self {
            id: RefreshTokenId::generate(),
            user_id,
            token_id,
            token_hash,
            expires_at: audit.created_at + ttl,
            revoked_at: None,
            audit,
        }
    }

    /// Not revoked, not expired at `now`, not soft-deleted.
    #[must_use]
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && self.expires_at > now && self.audit.is_active
    }

    /// Mark revoked. Returns `false` if it already was.
    pub fn revoke(&mut self, now: DateTime<Utc>) -> bool {
        if self.revoked_at.is_some() {
            return false;
        }
        self.revoked_at = Some(now);
        self.audit.touch(Some(self.user_id));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(ttl: Duration) -> RefreshToken {
        RefreshToken::issue(UserId::generate(), "abc".to_owned(), "00".to_owned(), ttl)
    }

    #[test]
    fn test_active_until_expiry() {
        let t = token(Duration::hours(1));
        assert!(t.is_active_at(Utc::now()));
        assert!(!t.is_active_at(t.expires_at));
    }

    #[test]
    fn test_revoke_once() {
        let mut t = token(Duration::hours(1));
        let now = Utc::now();
        assert!(t.revoke(now));
        assert!(!t.revoke(now));
        assert!(!t.is_active_at(now));
    }
}
