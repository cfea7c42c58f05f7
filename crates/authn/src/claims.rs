//! Token claims.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::roles::Role;

/// The payload of an identity token.
///
/// Timestamps are seconds since the Unix epoch. Roles are kept as wire
/// strings, in order, exactly as issued; duplicates are allowed and carry
/// no extra meaning. Use [`known_roles`](Self::known_roles) or
/// [`has_any_role`](Self::has_any_role) to interpret them.
///
/// Claims other than these are ignored when decoding.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use tokengate_authn::{Claims, Role};
///
/// let claims = Claims::new("user-1", [Role::Admin], 1_700_000_000, Duration::from_secs(3600));
/// assert_eq!(claims.exp, 1_700_003_600);
/// assert!(claims.has_any_role(&[Role::Admin, Role::Owner]));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, bon::Builder)]
pub struct Claims {
    /// Issuer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(into)]
    pub iss: Option<String>,

    /// Subject identifier.
    #[builder(into)]
    pub sub: String,

    /// Audience.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(into)]
    pub aud: Option<String>,

    /// Issued-at time.
    pub iat: u64,

    /// Expiration time. Must be strictly after `iat`.
    pub exp: u64,

    /// Role names, in issue order.
    #[serde(default)]
    #[builder(default)]
    pub roles: Vec<String>,
}

impl Claims {
    /// Creates claims for `sub` valid for `ttl` from `issued_at`.
    #[must_use]
    pub fn new(
        sub: impl Into<String>,
        roles: impl IntoIterator<Item = Role>,
        issued_at: u64,
        ttl: Duration,
    ) -> Self {
        Self {
            iss: None,
            sub: sub.into(),
            aud: None,
            iat: issued_at,
            exp: issued_at.saturating_add(ttl.as_secs()),
            roles: roles.into_iter().map(|role| role.as_str().to_owned()).collect(),
        }
    }

    /// Returns the recognized roles, in order. Unknown role strings are
    /// skipped with a warning.
    #[must_use]
    pub fn known_roles(&self) -> Vec<Role> {
        self.roles.iter().filter_map(|name| Role::from_claim(name)).collect()
    }

    /// Returns `true` if the claims carry `role`.
    #[must_use]
    pub fn has_role(&self, role: Role) -> bool {
        self.has_any_role(&[role])
    }

    /// Returns `true` if the claims carry at least one of `required`.
    ///
    /// An empty `required` set matches nothing.
    #[must_use]
    pub fn has_any_role(&self, required: &[Role]) -> bool {
        self.known_roles().iter().any(|role| required.contains(role))
    }

    /// Returns `true` if the claims are expired at `now` (`now >= exp`).
    #[must_use]
    pub fn is_expired_at(&self, now: u64) -> bool {
        now >= self.exp
    }
}
