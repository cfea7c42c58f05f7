//! # Tokengate Keys
//!
//! Key management for token issuance and validation.
//!
//! - [`SigningKey`] - a validated asymmetric private key with its derived [`PublicKey`], addressed
//!   by a [`KeyId`]
//! - [`KeySet`] - the private key map with exactly one active key
//! - [`PublicKeyLookup`] - the one-method trait validation resolves keys through, with
//!   [`StaticKeyLookup`] as the in-memory implementation
//! - [`jwks`] - JWK Set parsing; export lives on [`KeySet::to_jwks`]
//!
//! Only asymmetric algorithms are supported (see [`algorithm`]).

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod algorithm;
pub mod error;
pub mod jwks;
pub mod key_id;
pub mod key_set;
pub mod lookup;
pub mod public_key;
pub mod signing_key;
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used)]
pub mod testutil;

pub use algorithm::{KeyFamily, algorithm_name, parse_algorithm};
pub use error::{KeyError, KeyLookupError};
pub use jsonwebtoken::{Algorithm, jwk::JwkSet};
pub use key_id::KeyId;
pub use key_set::KeySet;
pub use lookup::{PublicKeyLookup, StaticKeyLookup};
pub use public_key::PublicKey;
pub use signing_key::SigningKey;
