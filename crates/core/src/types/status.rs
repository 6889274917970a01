//! Enumerations shared by the domain model and the API.

use serde::{Deserialize, Serialize};

/// Role of a user account.
///
/// `Admin` may manage the catalogue (products and bundles). `User` may place
/// and read their own orders. `Unknown` is never assigned by this service but
/// is kept so rows written by older tooling still decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "stockroom.user_role", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Unknown,
    #[default]
    User,
    Admin,
}

impl Role {
    /// Whether this role may mutate products and bundles.
    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::User => write!(f, "user"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unknown" => Ok(Self::Unknown),
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            _ => Err(format!("invalid role: {s}")),
        }
    }
}

/// What an order line refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderItemKind {
    Product,
    Variant,
    Bundle,
}

impl std::fmt::Display for OrderItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Product => write!(f, "product"),
            Self::Variant => write!(f, "variant"),
            Self::Bundle => write!(f, "bundle"),
        }
    }
}

impl std::str::FromStr for OrderItemKind {
    type Err = String;

    /// Parses the `type` field of an order line. Matching ignores case and
    /// surrounding whitespace.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "product" => Ok(Self::Product),
            "variant" => Ok(Self::Variant),
            "bundle" => Ok(Self::Bundle),
            _ => Err(format!("invalid item type: {s}")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trips_through_str() {
        for role in [Role::Unknown, Role::User, Role::Admin] {
            assert_eq!(role.to_string().parse::<Role>().unwrap(), role);
        }
        assert!("superuser".parse::<Role>().is_err());
        assert_eq!(Role::default(), Role::User);
    }

    #[test]
    fn test_order_item_kind_parsing_is_lenient_on_case() {
        assert_eq!(" Bundle ".parse::<OrderItemKind>().unwrap(), OrderItemKind::Bundle);
        assert_eq!("VARIANT".parse::<OrderItemKind>().unwrap(), OrderItemKind::Variant);
        assert!("gift_card".parse::<OrderItemKind>().is_err());
    }
}
