//! User role, as reported by the identity service.

use core::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Role attached to an authenticated user.
///
/// The identity service reports roles as free-form strings with inconsistent
/// casing ("user", "USER", "Admin"). Parsing is case-insensitive, and any
/// value outside the two known roles is preserved as [`Role::Other`] so it
/// can be logged, while every permission check fails safe against it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Role {
    /// A regular shopper. The only role allowed to hold a cart.
    Shopper,
    /// An administrative user (dashboards, inventory, reports).
    Admin,
    /// Any unrecognized role string, kept verbatim.
    Other(String),
}

impl Role {
    /// Parse a role string case-insensitively.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "user" => Self::Shopper,
            "admin" => Self::Admin,
            _ => Self::Other(s.to_owned()),
        }
    }

    /// True for administrative users.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }

    /// True for regular shoppers. Cart operations are gated on this.
    #[must_use]
    pub const fn is_shopper(&self) -> bool {
        matches!(self, Self::Shopper)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shopper => write!(f, "user"),
            Self::Admin => write!(f, "admin"),
            Self::Other(s) => write!(f, "{s}"),
        }
    }
}

impl From<&str> for Role {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl Serialize for Role {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::parse(&s))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_case_insensitive() {
        assert_eq!(Role::parse("user"), Role::Shopper);
        assert_eq!(Role::parse("USER"), Role::Shopper);
        assert_eq!(Role::parse("Admin"), Role::Admin);
        assert_eq!(Role::parse("ADMIN"), Role::Admin);
    }

    #[test]
    fn test_parse_unknown_preserved() {
        let role = Role::parse("Auditor");
        assert_eq!(role, Role::Other("Auditor".to_owned()));
        assert!(!role.is_admin());
        assert!(!role.is_shopper());
    }

    #[test]
    fn test_predicates() {
        assert!(Role::Shopper.is_shopper());
        assert!(!Role::Shopper.is_admin());
        assert!(Role::Admin.is_admin());
        assert!(!Role::Admin.is_shopper());
    }

    #[test]
    fn test_serde_roundtrip() {
        let json = serde_json::to_string(&Role::Shopper).unwrap();
        assert_eq!(json, "\"user\"");

        let parsed: Role = serde_json::from_str("\"ADMIN\"").unwrap();
        assert_eq!(parsed, Role::Admin);
    }
}
