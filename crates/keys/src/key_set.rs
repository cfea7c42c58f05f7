//! The private key map used for issuance.

use std::collections::BTreeMap;

use jsonwebtoken::jwk::JwkSet;

use crate::{error::KeyError, key_id::KeyId, signing_key::SigningKey};

/// A set of signing keys with exactly one active key.
///
/// The active key signs every new token. Other keys remain in the set only
/// so their public halves keep validating tokens issued before a rotation.
/// A `KeySet` is immutable; rotation builds a new set and swaps it in.
///
/// # Examples
///
/// ```
/// use tokengate_keys::{KeySet, SigningKey};
///
/// let old = SigningKey::generate_ed25519("2024-01").unwrap();
/// let new = SigningKey::generate_ed25519("2024-02").unwrap();
///
/// let set = KeySet::new([old, new], "2024-02").unwrap();
/// assert_eq!(set.active().kid().as_str(), "2024-02");
/// assert_eq!(set.len(), 2);
/// ```
#[derive(Clone, Debug)]
pub struct KeySet {
    keys: BTreeMap<KeyId, SigningKey>,
    active: KeyId,
}

impl KeySet {
    /// Builds a key set and selects the active key.
    ///
    /// # Errors
    ///
    /// - [`KeyError::EmptyKeySet`] if `keys` is empty
    /// - [`KeyError::DuplicateKeyId`] if two keys share a key ID
    /// - [`KeyError::ActiveKeyMissing`] if `active` names no key in the set
    pub fn new(keys: impl IntoIterator<Item = SigningKey>, active: &str) -> Result<Self, KeyError> {
        let mut map = BTreeMap::new();
        for key in keys {
            let kid = key.kid().clone();
            if map.contains_key(&kid) {
                return Err(KeyError::duplicate_key_id(kid));
            }
            map.insert(kid, key);
        }

        if map.is_empty() {
            return Err(KeyError::EmptyKeySet);
        }

        let active = map
            .keys()
            .find(|kid| kid.as_str() == active)
            .cloned()
            .ok_or_else(|| KeyError::active_key_missing(active))?;

        Ok(Self { keys: map, active })
    }

    /// Returns the key used for new issuance.
    #[must_use]
    pub fn active(&self) -> &SigningKey {
        // Presence is established in `new` and the map is never mutated.
        &self.keys[&self.active]
    }

    /// Returns the active key ID.
    #[must_use]
    pub fn active_kid(&self) -> &KeyId {
        &self.active
    }

    /// Returns the key registered under `kid`.
    #[must_use]
    pub fn get(&self, kid: &str) -> Option<&SigningKey> {
        self.keys.get(kid)
    }

    /// Returns the number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Always `false`; a key set holds at least one key.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Iterates over keys in key ID order.
    pub fn iter(&self) -> impl Iterator<Item = &SigningKey> {
        self.keys.values()
    }

    /// Exports the public halves as a JWK Set, in key ID order.
    #[must_use]
    pub fn to_jwks(&self) -> JwkSet {
        JwkSet { keys: self.keys.values().map(|key| key.public_key().to_jwk()).collect() }
    }
}
