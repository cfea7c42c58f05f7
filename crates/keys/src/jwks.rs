//! JWK Set (RFC 7517) parsing.
//!
//! Export lives on [`KeySet::to_jwks`](crate::KeySet::to_jwks) and
//! [`StaticKeyLookup::to_jwks`](crate::StaticKeyLookup::to_jwks); this
//! module handles the inbound direction, where documents come from other
//! processes and may contain keys this crate cannot or must not use.

use jsonwebtoken::jwk::JwkSet;

use crate::{error::KeyError, public_key::PublicKey};

/// Upper bound on the size of a JWK Set document, in bytes.
pub const MAX_JWKS_BYTES: usize = 256 * 1024;

/// Parses a JWK Set document.
///
/// # Errors
///
/// Returns [`KeyError::InvalidJwks`] if the document is oversized or is not
/// a JWK Set.
pub fn parse_jwks(document: &[u8]) -> Result<JwkSet, KeyError> {
    if document.len() > MAX_JWKS_BYTES {
        return Err(KeyError::invalid_jwks(format!(
            "document is {} bytes, limit is {MAX_JWKS_BYTES}",
            document.len()
        )));
    }
    serde_json::from_slice(document).map_err(|e| KeyError::invalid_jwks(e.to_string()))
}

/// Converts every usable signature key in `jwks` into a [`PublicKey`].
///
/// Keys that fail [`PublicKey::from_jwk`] (encryption keys, symmetric or
/// unsupported algorithms, short RSA moduli, missing `kid`) are skipped
/// with a warning so one bad entry does not take down every other key in a
/// published set.
#[must_use]
pub fn public_keys_from_jwks(jwks: &JwkSet) -> Vec<PublicKey> {
    jwks.keys
        .iter()
        .filter_map(|jwk| match PublicKey::from_jwk(jwk) {
            Ok(key) => Some(key),
            Err(e) => {
                tracing::warn!(
                    kid = jwk.common.key_id.as_deref().unwrap_or("<none>"),
                    error = %e,
                    "Skipping unusable JWK"
                );
                None
            },
        })
        .collect()
}
