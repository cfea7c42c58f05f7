//! Roles carried in token claims.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// A named permission grant.
///
/// Internally roles are a closed set; on the wire they are lowercase
/// strings. Parsing is case-insensitive so tokens minted by issuers that
/// upper-case role names (`"ADMIN"`) are understood.
///
/// Strings that name no known role are not an error: they are skipped with
/// a warning wherever claims are interpreted, so an issuer can introduce a
/// new role before every validator knows about it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Full administrative access.
    Admin,
    /// Owns the resources it is granted on.
    Owner,
    /// Regular authenticated user.
    User,
    /// Read-only access.
    Viewer,
}

impl Role {
    /// Every role, in declaration order.
    pub const ALL: [Role; 4] = [Role::Admin, Role::Owner, Role::User, Role::Viewer];

    /// Returns the wire name of this role.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Owner => "owner",
            Self::User => "user",
            Self::Viewer => "viewer",
        }
    }

    /// Parses a wire role name, logging a warning for unknown names.
    #[must_use]
    pub fn from_claim(name: &str) -> Option<Self> {
        match name.parse() {
            Ok(role) => Some(role),
            Err(UnknownRole(_)) => {
                tracing::warn!(role = name, "Ignoring unrecognized role in claims");
                None
            },
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string names no known [`Role`].
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownRole(s.to_owned()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("admin", Role::Admin)]
    #[case("ADMIN", Role::Admin)]
    #[case("Owner", Role::Owner)]
    #[case("user", Role::User)]
    #[case("viewer", Role::Viewer)]
    fn test_parse_case_insensitive(#[case] input: &str, #[case] expected: Role) {
        assert_eq!(input.parse::<Role>().unwrap(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("superuser")]
    #[case(" admin")]
    fn test_unknown_roles(#[case] input: &str) {
        assert_eq!(input.parse::<Role>(), Err(UnknownRole(input.to_owned())));
        assert_eq!(Role::from_claim(input), None);
    }

    #[test]
    fn test_wire_form_is_lowercase() {
        for role in Role::ALL {
            assert_eq!(serde_json::to_string(&role).unwrap(), format!("\"{}\"", role.as_str()));
            assert_eq!(role.to_string(), role.as_str());
        }
    }
}
