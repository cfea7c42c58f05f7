//! Key identifiers.

use std::{borrow::Borrow, fmt};

use serde::{Deserialize, Serialize};

use crate::error::KeyError;

/// Maximum accepted length of a key ID, in bytes.
pub const MAX_KEY_ID_LENGTH: usize = 128;

/// Opaque identifier naming exactly one key pair.
///
/// A `KeyId` travels in the `kid` header of every issued token and selects
/// the public key used to verify it. Within one process a key ID names one
/// key pair for its whole lifetime; key IDs are never reused.
///
/// Accepted characters are ASCII letters, digits, `.`, `_`, `:` and `-`.
/// The same rule is applied to `kid` values read from untrusted token
/// headers, so path fragments, whitespace or control bytes never reach a
/// key source.
///
/// # Examples
///
/// ```
/// use tokengate_keys::KeyId;
///
/// let kid = KeyId::new("54bb2165-71e1-41a6-af3e-7da4a0e1e2c1").unwrap();
/// assert_eq!(kid.as_str(), "54bb2165-71e1-41a6-af3e-7da4a0e1e2c1");
///
/// assert!(KeyId::new("../../etc/passwd").is_err());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct KeyId(String);

impl KeyId {
    /// Creates a key ID after validating its format.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidKeyId`] if the value is empty, longer than
    /// [`MAX_KEY_ID_LENGTH`], or contains a forbidden character.
    pub fn new(value: impl Into<String>) -> Result<Self, KeyError> {
        let value = value.into();
        validate_key_id(&value)?;
        Ok(Self(value))
    }

    /// Returns the key ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Validates the format of a key ID.
///
/// # Errors
///
/// Returns [`KeyError::InvalidKeyId`] describing the first rule violated.
pub fn validate_key_id(kid: &str) -> Result<(), KeyError> {
    if kid.is_empty() {
        return Err(KeyError::invalid_key_id("key ID is empty"));
    }
    if kid.len() > MAX_KEY_ID_LENGTH {
        return Err(KeyError::invalid_key_id(format!(
            "key ID exceeds {MAX_KEY_ID_LENGTH} bytes"
        )));
    }
    if !kid.bytes().all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b':' | b'-')) {
        return Err(KeyError::invalid_key_id("key ID contains forbidden characters"));
    }
    if kid.contains("..") {
        return Err(KeyError::invalid_key_id("key ID contains a path traversal sequence"));
    }
    Ok(())
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for KeyId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for KeyId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for KeyId {
    type Error = KeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for KeyId {
    type Error = KeyError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<KeyId> for String {
    fn from(kid: KeyId) -> Self {
        kid.0
    }
}
