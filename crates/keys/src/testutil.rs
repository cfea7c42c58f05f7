//! Shared key fixtures for tests.
//!
//! Feature-gated behind `testutil`. RSA fixtures are fixed 2048-bit keys
//! checked in under `testdata/` because generating RSA keys per test is
//! slow; Ed25519 keys are generated fresh on every call.
//!
//! ```toml
//! [dev-dependencies]
//! tokengate-keys = { workspace = true, features = ["testutil"] }
//! ```

use jsonwebtoken::Algorithm;

use crate::{KeySet, SigningKey, StaticKeyLookup};

/// Primary RSA test key, PKCS#8 PEM.
pub const RSA_PRIMARY_PEM: &str = include_str!("../testdata/rsa_primary.pem");

/// The primary RSA test key again, PKCS#1 PEM (`BEGIN RSA PRIVATE KEY`).
pub const RSA_PRIMARY_PKCS1_PEM: &str = include_str!("../testdata/rsa_primary_pkcs1.pem");

/// A second, unrelated RSA test key, PKCS#8 PEM.
pub const RSA_SECONDARY_PEM: &str = include_str!("../testdata/rsa_secondary.pem");

/// Ed25519 test key, PKCS#8 PEM.
pub const ED25519_PEM: &str = include_str!("../testdata/ed25519.pem");

/// Builds an `RS256` signing key from [`RSA_PRIMARY_PEM`].
///
/// # Panics
///
/// Panics if `kid` is not a valid key ID.
pub fn rsa_signing_key(kid: &str) -> SigningKey {
    SigningKey::from_pem(kid, Algorithm::RS256, RSA_PRIMARY_PEM)
        .expect("primary RSA fixture must load")
}

/// Builds an `RS256` signing key from [`RSA_SECONDARY_PEM`].
///
/// # Panics
///
/// Panics if `kid` is not a valid key ID.
pub fn rsa_secondary_signing_key(kid: &str) -> SigningKey {
    SigningKey::from_pem(kid, Algorithm::RS256, RSA_SECONDARY_PEM)
        .expect("secondary RSA fixture must load")
}

/// Generates a fresh `EdDSA` signing key.
///
/// # Panics
///
/// Panics if `kid` is not a valid key ID.
pub fn ed25519_signing_key(kid: &str) -> SigningKey {
    SigningKey::generate_ed25519(kid).expect("Ed25519 generation must succeed")
}

/// Builds a two-key RSA set (`primary`, `secondary`) with `primary` active,
/// and a lookup over both public halves.
///
/// # Panics
///
/// Panics if the fixtures fail to load.
pub fn rotation_fixture() -> (KeySet, StaticKeyLookup) {
    let set = KeySet::new(
        [rsa_signing_key("primary"), rsa_secondary_signing_key("secondary")],
        "primary",
    )
    .expect("fixture key set must build");
    let lookup = StaticKeyLookup::from_key_set(&set);
    (set, lookup)
}
