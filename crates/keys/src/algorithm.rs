//! Signature algorithm policy.
//!
//! Only asymmetric algorithms are accepted. Symmetric (`HS*`) algorithms
//! would let anyone holding the verification secret mint tokens, and
//! `none` disables verification entirely; both are rejected as
//! [`KeyError::ForbiddenAlgorithm`].

use jsonwebtoken::{Algorithm, jwk::KeyAlgorithm};

use crate::error::KeyError;

/// Algorithm names that may never be configured or accepted.
pub const FORBIDDEN_ALGORITHMS: &[&str] = &["none", "HS256", "HS384", "HS512"];

/// Algorithms a [`SigningKey`](crate::SigningKey) can be built for.
pub const SUPPORTED_ALGORITHMS: &[Algorithm] = &[
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::PS256,
    Algorithm::PS384,
    Algorithm::PS512,
    Algorithm::EdDSA,
];

/// The key type an algorithm signs with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyFamily {
    /// RSA keys (`RS*` and `PS*`).
    Rsa,
    /// Ed25519 keys (`EdDSA`).
    Ed25519,
}

/// Parses and vets an algorithm name.
///
/// Matching is exact and case-sensitive, as in the JOSE header.
///
/// # Errors
///
/// Returns [`KeyError::ForbiddenAlgorithm`] for `none` and `HS*`, and
/// [`KeyError::UnsupportedAlgorithm`] for anything else outside
/// [`SUPPORTED_ALGORITHMS`].
pub fn parse_algorithm(name: &str) -> Result<Algorithm, KeyError> {
    if FORBIDDEN_ALGORITHMS.contains(&name) {
        return Err(KeyError::forbidden_algorithm(name));
    }
    SUPPORTED_ALGORITHMS
        .iter()
        .copied()
        .find(|alg| algorithm_name(*alg) == name)
        .ok_or_else(|| KeyError::unsupported_algorithm(name))
}

/// Returns the JOSE name of an algorithm (`"RS256"`, `"EdDSA"`, ...).
#[must_use]
pub fn algorithm_name(algorithm: Algorithm) -> &'static str {
    match algorithm {
        Algorithm::HS256 => "HS256",
        Algorithm::HS384 => "HS384",
        Algorithm::HS512 => "HS512",
        Algorithm::ES256 => "ES256",
        Algorithm::ES384 => "ES384",
        Algorithm::RS256 => "RS256",
        Algorithm::RS384 => "RS384",
        Algorithm::RS512 => "RS512",
        Algorithm::PS256 => "PS256",
        Algorithm::PS384 => "PS384",
        Algorithm::PS512 => "PS512",
        Algorithm::EdDSA => "EdDSA",
    }
}

/// Returns the key family for a supported algorithm.
///
/// # Errors
///
/// Returns [`KeyError::ForbiddenAlgorithm`] or
/// [`KeyError::UnsupportedAlgorithm`] for algorithms outside
/// [`SUPPORTED_ALGORITHMS`].
pub fn key_family(algorithm: Algorithm) -> Result<KeyFamily, KeyError> {
    match algorithm {
        Algorithm::RS256
        | Algorithm::RS384
        | Algorithm::RS512
        | Algorithm::PS256
        | Algorithm::PS384
        | Algorithm::PS512 => Ok(KeyFamily::Rsa),
        Algorithm::EdDSA => Ok(KeyFamily::Ed25519),
        other => {
            let name = algorithm_name(other);
            if FORBIDDEN_ALGORITHMS.contains(&name) {
                Err(KeyError::forbidden_algorithm(name))
            } else {
                Err(KeyError::unsupported_algorithm(name))
            }
        },
    }
}

/// Maps a supported algorithm to its JWK `alg` value.
pub(crate) fn to_key_algorithm(algorithm: Algorithm) -> Result<KeyAlgorithm, KeyError> {
    match algorithm {
        Algorithm::RS256 => Ok(KeyAlgorithm::RS256),
        Algorithm::RS384 => Ok(KeyAlgorithm::RS384),
        Algorithm::RS512 => Ok(KeyAlgorithm::RS512),
        Algorithm::PS256 => Ok(KeyAlgorithm::PS256),
        Algorithm::PS384 => Ok(KeyAlgorithm::PS384),
        Algorithm::PS512 => Ok(KeyAlgorithm::PS512),
        Algorithm::EdDSA => Ok(KeyAlgorithm::EdDSA),
        other => Err(KeyError::unsupported_algorithm(algorithm_name(other))),
    }
}

/// Maps a JWK `alg` value back to a supported signature algorithm.
pub(crate) fn from_key_algorithm(algorithm: &KeyAlgorithm) -> Option<Algorithm> {
    match algorithm {
        KeyAlgorithm::RS256 => Some(Algorithm::RS256),
        KeyAlgorithm::RS384 => Some(Algorithm::RS384),
        KeyAlgorithm::RS512 => Some(Algorithm::RS512),
        KeyAlgorithm::PS256 => Some(Algorithm::PS256),
        KeyAlgorithm::PS384 => Some(Algorithm::PS384),
        KeyAlgorithm::PS512 => Some(Algorithm::PS512),
        KeyAlgorithm::EdDSA => Some(Algorithm::EdDSA),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("RS256", Algorithm::RS256, KeyFamily::Rsa)]
    #[case("RS512", Algorithm::RS512, KeyFamily::Rsa)]
    #[case("PS384", Algorithm::PS384, KeyFamily::Rsa)]
    #[case("EdDSA", Algorithm::EdDSA, KeyFamily::Ed25519)]
    fn test_supported_algorithms(
        #[case] name: &str,
        #[case] expected: Algorithm,
        #[case] family: KeyFamily,
    ) {
        let alg = parse_algorithm(name).unwrap();
        assert_eq!(alg, expected);
        assert_eq!(key_family(alg).unwrap(), family);
        assert_eq!(algorithm_name(alg), name);
    }

    #[rstest]
    #[case("none")]
    #[case("HS256")]
    #[case("HS384")]
    #[case("HS512")]
    fn test_forbidden_algorithms(#[case] name: &str) {
        assert!(matches!(parse_algorithm(name), Err(KeyError::ForbiddenAlgorithm { .. })));
    }

    #[rstest]
    #[case("ES256")]
    #[case("rs256")]
    #[case("RS1024")]
    #[case("")]
    fn test_unsupported_algorithms(#[case] name: &str) {
        assert!(matches!(parse_algorithm(name), Err(KeyError::UnsupportedAlgorithm { .. })));
    }

    #[test]
    fn test_symmetric_family_is_forbidden() {
        assert!(matches!(key_family(Algorithm::HS256), Err(KeyError::ForbiddenAlgorithm { .. })));
        assert!(matches!(key_family(Algorithm::ES256), Err(KeyError::UnsupportedAlgorithm { .. })));
    }

    #[test]
    fn test_key_algorithm_mapping_covers_supported_set() {
        for alg in SUPPORTED_ALGORITHMS {
            let key_alg = to_key_algorithm(*alg).unwrap();
            assert_eq!(from_key_algorithm(&key_alg), Some(*alg));
        }
        assert_eq!(from_key_algorithm(&KeyAlgorithm::HS256), None);
    }
}
