//! Algorithm and claims validation.
//!
//! - [`validate_algorithm`] vets the configured algorithm at construction.
//! - [`validate_for_issue`] enforces the structural rules issued claims
//!   must satisfy.
//! - [`ClaimsPolicy`] checks issuer and audience after a token has been
//!   verified, when the deployment configures expected values.

use tokengate_keys::{Algorithm, KeyError, parse_algorithm};

use crate::{
    claims::Claims,
    error::{AuthError, Result},
};

/// Parses the configured algorithm name and rejects anything that is not a
/// supported asymmetric algorithm.
///
/// # Errors
///
/// Returns [`AuthError::InvalidConfiguration`] for `none`, `HS*`, and any
/// name outside the supported set.
///
/// # Examples
///
/// ```
/// use tokengate_authn::validation::validate_algorithm;
///
/// assert!(validate_algorithm("RS256").is_ok());
/// assert!(validate_algorithm("EdDSA").is_ok());
/// assert!(validate_algorithm("HS256").is_err());
/// assert!(validate_algorithm("none").is_err());
/// ```
pub fn validate_algorithm(name: &str) -> Result<Algorithm> {
    parse_algorithm(name).map_err(|err| {
        let message = match &err {
            KeyError::ForbiddenAlgorithm { algorithm } => format!(
                "algorithm '{algorithm}' is forbidden; only asymmetric algorithms are allowed"
            ),
            other => other.to_string(),
        };
        AuthError::InvalidConfiguration { message, source: Some(err) }
    })
}

/// Checks the structural requirements on claims presented for issuance.
///
/// # Errors
///
/// Returns [`AuthError::InvalidClaims`] if the subject is empty or if `exp`
/// is not strictly after `iat`.
pub fn validate_for_issue(claims: &Claims) -> Result<()> {
    if claims.sub.is_empty() {
        return Err(AuthError::invalid_claims("subject must not be empty"));
    }
    if claims.exp <= claims.iat {
        return Err(AuthError::invalid_claims("expiration must be after issued-at"));
    }
    Ok(())
}

/// Optional expectations on `iss` and `aud`.
///
/// An unset expectation is not checked. A set expectation requires the
/// claim to be present and equal.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClaimsPolicy {
    /// Expected `iss`.
    pub issuer: Option<String>,
    /// Expected `aud`.
    pub audience: Option<String>,
}

impl ClaimsPolicy {
    /// Checks `claims` against the configured expectations.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidIssuer`] or [`AuthError::InvalidAudience`].
    pub fn check(&self, claims: &Claims) -> Result<()> {
        if let Some(expected) = &self.issuer
            && claims.iss.as_deref() != Some(expected.as_str())
        {
            return Err(AuthError::InvalidIssuer);
        }
        if let Some(expected) = &self.audience
            && claims.aud.as_deref() != Some(expected.as_str())
        {
            return Err(AuthError::InvalidAudience);
        }
        Ok(())
    }
}
