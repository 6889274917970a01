//! User accounts.

use serde::{Deserialize, Serialize};

use crate::audit::Audit;
use crate::types::{Email, Role, UserId};

/// A registered account. The password hash is opaque to this crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: Email,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub audit: Audit,
}

impl User {
    #[must_use]
    pub fn new(
        email: Email,
        password_hash: String,
        first_name: &str,
        last_name: &str,
        role: Role,
    ) -> Self {
        Self {
            id: UserId::generate(),
            email,
            password_hash,
            first_name: first_name.trim().to_owned(),
            last_name: last_name.trim().to_owned(),
            role,
            audit: Audit::new(None),
        }
    }

    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_owned()
    }

    #[must_use]
    pub const fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user_defaults() {
        let user = User::new(
            Email::parse("ops@warehouse.example").unwrap(),
            "$argon2id$stub".to_owned(),
            " Ada ",
            "Lovelace",
            Role::default(),
        );
        assert_eq!(user.full_name(), "Ada Lovelace");
        assert!(!user.is_admin());
        assert!(user.audit.is_active);

        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
    }
}
