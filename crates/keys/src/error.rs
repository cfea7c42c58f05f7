//! Key management error types.
//!
//! Two error families live here:
//!
//! - [`KeyError`] - raised while building key material and key sets. These are configuration-time
//!   failures; a process that hits one cannot serve requests.
//! - [`KeyLookupError`] - raised by a [`PublicKeyLookup`](crate::PublicKeyLookup) while resolving
//!   a key ID on the validation path. [`is_transient`](KeyLookupError::is_transient) separates
//!   outages from definitive answers.

use std::sync::Arc;

use thiserror::Error;

/// A shared error type for source chain tracking.
pub type BoxError = Arc<dyn std::error::Error + Send + Sync>;

/// Errors raised while constructing signing keys, public keys and key sets.
///
/// # Non-exhaustive
///
/// New variants may be added in minor releases. Downstream match
/// expressions must include a wildcard arm (`_ =>`).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KeyError {
    /// Key ID is empty, too long or contains forbidden characters.
    #[error("Invalid key ID: {reason}")]
    InvalidKeyId {
        /// Why the key ID was rejected.
        reason: String,
    },

    /// Algorithm is `none` or symmetric and may never be used.
    #[error("Forbidden algorithm: {algorithm}")]
    ForbiddenAlgorithm {
        /// Algorithm name as supplied.
        algorithm: String,
    },

    /// Algorithm is not one of the supported asymmetric algorithms.
    #[error("Unsupported key algorithm: {algorithm}")]
    UnsupportedAlgorithm {
        /// Algorithm name as supplied.
        algorithm: String,
    },

    /// Key material failed to parse or failed structural validation.
    #[error("Invalid key material for '{kid}': {message}")]
    InvalidKeyMaterial {
        /// Key ID the material was supplied for.
        kid: String,
        /// Description of the failure. Never contains key bytes.
        message: String,
    },

    /// Two keys in one set share a key ID.
    #[error("Duplicate key ID: {kid}")]
    DuplicateKeyId {
        /// The repeated key ID.
        kid: String,
    },

    /// The configured active key ID is not part of the key set.
    #[error("Active key '{kid}' is not present in the key set")]
    ActiveKeyMissing {
        /// The configured active key ID.
        kid: String,
    },

    /// A key set was built from zero keys.
    #[error("Key set is empty")]
    EmptyKeySet,

    /// A JWK Set document could not be parsed.
    #[error("Invalid JWK Set: {message}")]
    InvalidJwks {
        /// Description of the parse failure.
        message: String,
    },
}

impl KeyError {
    /// Creates a new `InvalidKeyId` error.
    #[must_use]
    pub fn invalid_key_id(reason: impl Into<String>) -> Self {
        Self::InvalidKeyId { reason: reason.into() }
    }

    /// Creates a new `ForbiddenAlgorithm` error.
    #[must_use]
    pub fn forbidden_algorithm(algorithm: impl Into<String>) -> Self {
        Self::ForbiddenAlgorithm { algorithm: algorithm.into() }
    }

    /// Creates a new `UnsupportedAlgorithm` error.
    #[must_use]
    pub fn unsupported_algorithm(algorithm: impl Into<String>) -> Self {
        Self::UnsupportedAlgorithm { algorithm: algorithm.into() }
    }

    /// Creates a new `InvalidKeyMaterial` error.
    #[must_use]
    pub fn invalid_key_material(kid: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidKeyMaterial { kid: kid.into(), message: message.into() }
    }

    /// Creates a new `DuplicateKeyId` error.
    #[must_use]
    pub fn duplicate_key_id(kid: impl Into<String>) -> Self {
        Self::DuplicateKeyId { kid: kid.into() }
    }

    /// Creates a new `ActiveKeyMissing` error.
    #[must_use]
    pub fn active_key_missing(kid: impl Into<String>) -> Self {
        Self::ActiveKeyMissing { kid: kid.into() }
    }

    /// Creates a new `InvalidJwks` error.
    #[must_use]
    pub fn invalid_jwks(message: impl Into<String>) -> Self {
        Self::InvalidJwks { message: message.into() }
    }
}

/// Errors raised while resolving a key ID to a public key.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum KeyLookupError {
    /// No public key is registered under this key ID.
    #[error("Public key not found: {kid}")]
    NotFound {
        /// Key ID that was not found.
        kid: String,
    },

    /// The key source did not answer in time.
    #[error("Public key lookup timed out")]
    Timeout,

    /// The key source could not be reached or returned an unusable response.
    #[error("Public key source unavailable: {message}")]
    Unavailable {
        /// Description of the failure.
        message: String,
        /// The underlying error, if any.
        #[source]
        source: Option<BoxError>,
    },

    /// The key source returned a key that cannot be used for verification.
    #[error("Invalid public key '{kid}': {message}")]
    InvalidKey {
        /// Key ID of the unusable key.
        kid: String,
        /// Why the key was rejected.
        message: String,
    },
}

impl KeyLookupError {
    /// Creates a new `NotFound` error.
    #[must_use]
    pub fn not_found(kid: impl Into<String>) -> Self {
        Self::NotFound { kid: kid.into() }
    }

    /// Creates a new `Timeout` error.
    #[must_use]
    pub fn timeout() -> Self {
        Self::Timeout
    }

    /// Creates a new `Unavailable` error without a source.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable { message: message.into(), source: None }
    }

    /// Creates a new `Unavailable` error with a message and source error.
    #[must_use]
    pub fn unavailable_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Unavailable { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates a new `InvalidKey` error.
    #[must_use]
    pub fn invalid_key(kid: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidKey { kid: kid.into(), message: message.into() }
    }

    /// Returns `true` when the key source is temporarily unusable.
    ///
    /// Transient failures may succeed on retry; `NotFound` and `InvalidKey`
    /// are definitive answers from the source.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout | Self::Unavailable { .. })
    }
}
