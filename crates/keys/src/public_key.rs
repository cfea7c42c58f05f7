//! Verification keys.

use std::fmt;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{
    Algorithm, DecodingKey,
    jwk::{AlgorithmParameters, EllipticCurve, Jwk, PublicKeyUse},
};

use crate::{
    algorithm::{KeyFamily, algorithm_name, from_key_algorithm, key_family},
    error::KeyError,
    key_id::KeyId,
    signing_key::MIN_RSA_MODULUS_BITS,
};

/// The public half of a signing key pair, ready for signature verification.
///
/// A `PublicKey` is bound to one [`KeyId`] and one algorithm. It carries the
/// JWK form it was built from (or exported as), so key sets can be
/// republished without touching private material.
#[derive(Clone)]
pub struct PublicKey {
    kid: KeyId,
    algorithm: Algorithm,
    decoding: DecodingKey,
    jwk: Jwk,
}

impl PublicKey {
    pub(crate) fn new(kid: KeyId, algorithm: Algorithm, decoding: DecodingKey, jwk: Jwk) -> Self {
        Self { kid, algorithm, decoding, jwk }
    }

    /// Builds a verification key from a JSON Web Key.
    ///
    /// The JWK must carry a `kid`, must not be marked for encryption use, and
    /// must name a supported `alg`. An OKP key on the Ed25519 curve without
    /// `alg` is taken as `EdDSA`; RSA keys must declare their algorithm since
    /// `RS*` and `PS*` share a key type. RSA moduli shorter than
    /// 2048 bits are rejected.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError`] describing the first problem found.
    pub fn from_jwk(jwk: &Jwk) -> Result<Self, KeyError> {
        let raw_kid = jwk
            .common
            .key_id
            .as_deref()
            .ok_or_else(|| KeyError::invalid_jwks("JWK is missing 'kid'"))?;
        let kid = KeyId::new(raw_kid)?;

        if let Some(key_use) = &jwk.common.public_key_use
            && *key_use != PublicKeyUse::Signature
        {
            return Err(KeyError::invalid_key_material(kid.as_str(), "JWK is not a signature key"));
        }

        let algorithm = match (&jwk.common.key_algorithm, &jwk.algorithm) {
            (Some(key_alg), _) => from_key_algorithm(key_alg)
                .ok_or_else(|| KeyError::unsupported_algorithm(format!("{key_alg:?}")))?,
            (None, AlgorithmParameters::OctetKeyPair(_)) => Algorithm::EdDSA,
            (None, _) => {
                return Err(KeyError::invalid_key_material(kid.as_str(), "JWK is missing 'alg'"));
            },
        };

        match (key_family(algorithm)?, &jwk.algorithm) {
            (KeyFamily::Rsa, AlgorithmParameters::RSA(params)) => {
                let modulus = URL_SAFE_NO_PAD.decode(params.n.as_bytes()).map_err(|_| {
                    KeyError::invalid_key_material(kid.as_str(), "RSA modulus is not base64url")
                })?;
                let bits = significant_bits(&modulus);
                if bits < MIN_RSA_MODULUS_BITS {
                    return Err(KeyError::invalid_key_material(
                        kid.as_str(),
                        format!("RSA modulus is {bits} bits, minimum is {MIN_RSA_MODULUS_BITS}"),
                    ));
                }
            },
            (KeyFamily::Ed25519, AlgorithmParameters::OctetKeyPair(params))
                if params.curve == EllipticCurve::Ed25519 => {},
            _ => {
                return Err(KeyError::invalid_key_material(
                    kid.as_str(),
                    format!("key type does not match algorithm {}", algorithm_name(algorithm)),
                ));
            },
        }

        let decoding = DecodingKey::from_jwk(jwk)
            .map_err(|e| KeyError::invalid_key_material(kid.as_str(), e.to_string()))?;

        Ok(Self { kid, algorithm, decoding, jwk: jwk.clone() })
    }

    /// Returns the key ID.
    #[must_use]
    pub fn kid(&self) -> &KeyId {
        &self.kid
    }

    /// Returns the algorithm this key verifies.
    #[must_use]
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Returns the underlying decoding key.
    #[must_use]
    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding
    }

    /// Returns the JWK representation of this key.
    #[must_use]
    pub fn to_jwk(&self) -> Jwk {
        self.jwk.clone()
    }

    /// Verifies a base64url signature over `message`.
    ///
    /// Returns `false` for any failure, including a signature segment that is
    /// not valid base64url.
    #[must_use]
    pub fn verify(&self, message: &[u8], signature: &str) -> bool {
        jsonwebtoken::crypto::verify(signature, message, &self.decoding, self.algorithm)
            .unwrap_or(false)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicKey")
            .field("kid", &self.kid)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

fn significant_bits(bytes: &[u8]) -> usize {
    match bytes.iter().position(|b| *b != 0) {
        Some(first) => (bytes.len() - first) * 8 - bytes[first].leading_zeros() as usize,
        None => 0,
    }
}
