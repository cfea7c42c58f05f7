//! Authentication and authorization error types.
//!
//! [`AuthError`] covers configuration, issuance and token validation.
//! [`AccessError`] is what the authorization middleware returns; it keeps
//! the authentication cause for logging while presenting a uniform,
//! non-leaking message to callers.

use http::StatusCode;
use thiserror::Error;
use tokengate_keys::{KeyError, KeyLookupError};

/// Authentication errors.
///
/// None of the messages include key material or claim contents.
///
/// # Non-exhaustive
///
/// New variants may be added in minor releases. Downstream match
/// expressions must include a wildcard arm (`_ =>`).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthError {
    /// Construction-time problem: bad algorithm, unusable key material,
    /// missing active key. Fatal at startup.
    #[error("Invalid configuration: {message}")]
    InvalidConfiguration {
        /// Description of the problem.
        message: String,
        /// The key error that caused it, if any.
        #[source]
        source: Option<KeyError>,
    },

    /// The token names a key ID the lookup does not know.
    #[error("Signing key not found: {kid}")]
    KeyNotFound {
        /// Key ID from the token header.
        kid: String,
    },

    /// The token (or the key it names) uses a different algorithm than the
    /// one this authenticator is configured for.
    #[error("Algorithm mismatch: expected {expected}, found {found}")]
    AlgorithmMismatch {
        /// Configured algorithm.
        expected: String,
        /// Algorithm declared by the token or key.
        found: String,
    },

    /// The token is not a parseable JWS compact serialization.
    #[error("Malformed token: {0}")]
    MalformedToken(String),

    /// Signature verification failed.
    #[error("Invalid signature")]
    InvalidSignature,

    /// The current time is at or after the token's expiration.
    #[error("Token expired")]
    TokenExpired,

    /// The public key lookup did not finish within its deadline.
    #[error("Key lookup timed out")]
    KeyLookupTimeout,

    /// The public key source failed for a reason other than a timeout.
    #[error("Key lookup unavailable: {0}")]
    KeyLookupUnavailable(
        /// The underlying lookup error.
        #[source]
        KeyLookupError,
    ),

    /// The key source returned a key that cannot verify tokens.
    #[error("Invalid public key: {kid}")]
    InvalidPublicKey {
        /// Key ID of the rejected key.
        kid: String,
    },

    /// The `iss` claim is missing or differs from the expected issuer.
    #[error("Invalid issuer")]
    InvalidIssuer,

    /// The `aud` claim is missing or differs from the expected audience.
    #[error("Invalid audience")]
    InvalidAudience,

    /// Claims presented for issuance are structurally invalid.
    #[error("Invalid claims: {0}")]
    InvalidClaims(String),
}

impl AuthError {
    /// Creates a new `InvalidConfiguration` error without a source.
    #[must_use]
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration { message: message.into(), source: None }
    }

    /// Creates a new `KeyNotFound` error.
    #[must_use]
    pub fn key_not_found(kid: impl Into<String>) -> Self {
        Self::KeyNotFound { kid: kid.into() }
    }

    /// Creates a new `AlgorithmMismatch` error.
    #[must_use]
    pub fn algorithm_mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::AlgorithmMismatch { expected: expected.into(), found: found.into() }
    }

    /// Creates a new `MalformedToken` error.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedToken(message.into())
    }

    /// Creates a new `InvalidClaims` error.
    #[must_use]
    pub fn invalid_claims(message: impl Into<String>) -> Self {
        Self::InvalidClaims(message.into())
    }

    /// Returns `true` for failures that may succeed on retry with backoff.
    ///
    /// Only key source outages qualify. Every token-level failure is
    /// terminal for the request.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::KeyLookupTimeout | Self::KeyLookupUnavailable(_))
    }

    /// Returns a short, stable label for this error kind, for logs and
    /// metrics labels.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidConfiguration { .. } => "invalid_configuration",
            Self::KeyNotFound { .. } => "key_not_found",
            Self::AlgorithmMismatch { .. } => "algorithm_mismatch",
            Self::MalformedToken(_) => "malformed_token",
            Self::InvalidSignature => "invalid_signature",
            Self::TokenExpired => "token_expired",
            Self::KeyLookupTimeout => "key_lookup_timeout",
            Self::KeyLookupUnavailable(_) => "key_lookup_unavailable",
            Self::InvalidPublicKey { .. } => "invalid_public_key",
            Self::InvalidIssuer => "invalid_issuer",
            Self::InvalidAudience => "invalid_audience",
            Self::InvalidClaims(_) => "invalid_claims",
        }
    }
}

impl From<KeyError> for AuthError {
    fn from(err: KeyError) -> Self {
        Self::InvalidConfiguration { message: err.to_string(), source: Some(err) }
    }
}

impl From<KeyLookupError> for AuthError {
    fn from(err: KeyLookupError) -> Self {
        match err {
            KeyLookupError::NotFound { kid } => Self::KeyNotFound { kid },
            KeyLookupError::Timeout => Self::KeyLookupTimeout,
            KeyLookupError::InvalidKey { kid, .. } => Self::InvalidPublicKey { kid },
            other => Self::KeyLookupUnavailable(other),
        }
    }
}

/// Result type alias for authentication operations.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Errors returned by the authorization middleware.
///
/// `Display` is uniform ("Unauthenticated", "Forbidden") so it
/// can be returned to clients as-is. The underlying [`AuthError`] is
/// available through [`reason`](Self::reason) and `source()`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AccessError {
    /// The request carried no bearer credential.
    #[error("Missing credential")]
    MissingCredential,

    /// The credential failed validation.
    #[error("Unauthenticated")]
    Unauthenticated(#[source] AuthError),

    /// The credential is valid but carries none of the required roles.
    #[error("Forbidden")]
    Forbidden,
}

impl AccessError {
    /// Returns the validation failure behind an `Unauthenticated` error.
    #[must_use]
    pub fn reason(&self) -> Option<&AuthError> {
        match self {
            Self::Unauthenticated(err) => Some(err),
            Self::MissingCredential | Self::Forbidden => None,
        }
    }

    /// Returns the HTTP status this error maps to.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingCredential | Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
        }
    }

    /// Returns `true` for authentication failures (as opposed to
    /// authorization failures).
    #[must_use]
    pub fn is_authentication_failure(&self) -> bool {
        !matches!(self, Self::Forbidden)
    }
}

impl From<AuthError> for AccessError {
    fn from(err: AuthError) -> Self {
        Self::Unauthenticated(err)
    }
}
