//! Public key resolution for token validation.

use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use jsonwebtoken::jwk::JwkSet;

use crate::{
    error::{KeyError, KeyLookupError},
    jwks::public_keys_from_jwks,
    key_id::KeyId,
    key_set::KeySet,
    public_key::PublicKey,
};

/// Resolves a key ID to the public key that verifies tokens signed under it.
///
/// Validation is written against this trait so a static in-process map and
/// a remote key service are interchangeable. Implementations must be safe
/// to call concurrently from many tasks.
///
/// A key ID that is unknown, retired or fabricated must produce
/// [`KeyLookupError::NotFound`]. Source outages are reported as
/// [`KeyLookupError::Timeout`] or [`KeyLookupError::Unavailable`] so callers
/// can tell "no such key" from "could not ask".
#[async_trait]
pub trait PublicKeyLookup: Send + Sync {
    /// Returns the public key registered under `kid`.
    async fn public_key_for(&self, kid: &str) -> Result<Arc<PublicKey>, KeyLookupError>;
}

#[async_trait]
impl<T: PublicKeyLookup + ?Sized> PublicKeyLookup for Arc<T> {
    async fn public_key_for(&self, kid: &str) -> Result<Arc<PublicKey>, KeyLookupError> {
        (**self).public_key_for(kid).await
    }
}

/// An in-memory, immutable map of public keys.
///
/// Cloning is cheap. Rotation produces a new lookup through
/// [`with_key`](Self::with_key) or [`without_key`](Self::without_key)
/// rather than mutating a shared one.
#[derive(Clone, Debug, Default)]
pub struct StaticKeyLookup {
    keys: Arc<BTreeMap<KeyId, Arc<PublicKey>>>,
}

impl StaticKeyLookup {
    /// Creates an empty lookup. Every query answers `NotFound`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a lookup from a list of public keys.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::DuplicateKeyId`] if two keys share a key ID.
    pub fn from_keys(keys: impl IntoIterator<Item = PublicKey>) -> Result<Self, KeyError> {
        let mut map = BTreeMap::new();
        for key in keys {
            let kid = key.kid().clone();
            if map.contains_key(&kid) {
                return Err(KeyError::duplicate_key_id(kid));
            }
            map.insert(kid, Arc::new(key));
        }
        Ok(Self { keys: Arc::new(map) })
    }

    /// Builds a lookup over the public halves of every key in `set`.
    #[must_use]
    pub fn from_key_set(set: &KeySet) -> Self {
        let map = set
            .iter()
            .map(|key| (key.kid().clone(), Arc::new(key.public_key().clone())))
            .collect();
        Self { keys: Arc::new(map) }
    }

    /// Builds a lookup from a JWK Set.
    ///
    /// Entries that are not usable for signature verification are skipped
    /// with a warning (see [`public_keys_from_jwks`]).
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::DuplicateKeyId`] if two usable keys share a key ID.
    pub fn from_jwks(jwks: &JwkSet) -> Result<Self, KeyError> {
        Self::from_keys(public_keys_from_jwks(jwks))
    }

    /// Returns a new lookup that also contains `key`.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::DuplicateKeyId`] if the key ID is already present.
    /// Key IDs are never rebound to different key material.
    pub fn with_key(&self, key: PublicKey) -> Result<Self, KeyError> {
        if self.keys.contains_key(key.kid()) {
            return Err(KeyError::duplicate_key_id(key.kid().clone()));
        }
        let mut map = (*self.keys).clone();
        map.insert(key.kid().clone(), Arc::new(key));
        Ok(Self { keys: Arc::new(map) })
    }

    /// Returns a new lookup without the key registered under `kid`.
    ///
    /// Tokens signed under a removed key fail validation with `NotFound`.
    #[must_use]
    pub fn without_key(&self, kid: &str) -> Self {
        let mut map = (*self.keys).clone();
        map.remove(kid);
        Self { keys: Arc::new(map) }
    }

    /// Returns `true` if a key is registered under `kid`.
    #[must_use]
    pub fn contains(&self, kid: &str) -> bool {
        self.keys.contains_key(kid)
    }

    /// Returns the registered key IDs in order.
    pub fn kids(&self) -> impl Iterator<Item = &KeyId> {
        self.keys.keys()
    }

    /// Returns the number of registered keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns `true` if no keys are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Exports the registered keys as a JWK Set.
    #[must_use]
    pub fn to_jwks(&self) -> JwkSet {
        JwkSet { keys: self.keys.values().map(|key| key.to_jwk()).collect() }
    }
}

#[async_trait]
impl PublicKeyLookup for StaticKeyLookup {
    async fn public_key_for(&self, kid: &str) -> Result<Arc<PublicKey>, KeyLookupError> {
        self.keys.get(kid).cloned().ok_or_else(|| KeyLookupError::not_found(kid))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::testutil::{ed25519_signing_key, rotation_fixture, rsa_signing_key};

    #[tokio::test]
    async fn test_lookup_from_key_set() {
        let (_, lookup) = rotation_fixture();

        let key = lookup.public_key_for("primary").await.unwrap();
        assert_eq!(key.kid().as_str(), "primary");
        assert!(lookup.public_key_for("secondary").await.is_ok());

        let err = lookup.public_key_for("fabricated").await.unwrap_err();
        assert!(matches!(err, KeyLookupError::NotFound { ref kid } if kid == "fabricated"));
    }

    #[tokio::test]
    async fn test_without_key_leaves_original_untouched() {
        let (_, lookup) = rotation_fixture();
        let retired = lookup.without_key("secondary");

        assert!(matches!(
            retired.public_key_for("secondary").await,
            Err(KeyLookupError::NotFound { .. })
        ));
        assert!(retired.public_key_for("primary").await.is_ok());
        assert!(lookup.public_key_for("secondary").await.is_ok());
        assert_eq!(lookup.len(), 2);
        assert_eq!(retired.len(), 1);
    }

    #[tokio::test]
    async fn test_with_key_adds_and_refuses_rebinding() {
        let lookup = StaticKeyLookup::new();
        assert!(lookup.is_empty());

        let ed = ed25519_signing_key("ed-1");
        let lookup = lookup.with_key(ed.public_key().clone()).unwrap();
        assert!(lookup.contains("ed-1"));

        let other = ed25519_signing_key("ed-1");
        let err = lookup.with_key(other.public_key().clone()).unwrap_err();
        assert!(matches!(err, KeyError::DuplicateKeyId { .. }));
    }

    #[test]
    fn test_from_keys_rejects_duplicates() {
        let a = rsa_signing_key("dup").public_key().clone();
        let b = ed25519_signing_key("dup").public_key().clone();

        assert!(matches!(StaticKeyLookup::from_keys([a, b]), Err(KeyError::DuplicateKeyId { .. })));
    }

    #[tokio::test]
    async fn test_jwks_round_trip_preserves_keys() {
        let (set, lookup) = rotation_fixture();
        let rebuilt = StaticKeyLookup::from_jwks(&lookup.to_jwks()).unwrap();

        let kids: Vec<_> = rebuilt.kids().map(KeyId::as_str).collect();
        assert_eq!(kids, vec!["primary", "secondary"]);

        let signature = set.active().sign(b"payload").unwrap();
        let key = rebuilt.public_key_for("primary").await.unwrap();
        assert!(key.verify(b"payload", &signature));
    }

    #[tokio::test]
    async fn test_arc_dyn_lookup_delegates() {
        let (_, lookup) = rotation_fixture();
        let shared: Arc<dyn PublicKeyLookup> = Arc::new(lookup);

        assert!(shared.public_key_for("primary").await.is_ok());
    }
}
