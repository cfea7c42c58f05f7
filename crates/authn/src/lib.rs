//! # Tokengate Authentication
//!
//! Token issuance, validation and role-based authorization.
//!
//! This crate provides:
//! - **Token codec**: JWS compact encoding and a fail-closed decode pipeline ([`codec`])
//! - **Authenticator**: the single trust boundary for issuing and validating tokens
//! - **Authorization**: [`RequireRole`] guards with "any of" role semantics, plus an axum adapter
//!   ([`http`])
//! - **Key sources**: cached and remote (JWK Set over HTTP) public key lookups
//!
//! Key material lives in `tokengate-keys`. Only asymmetric algorithms are
//! accepted; `none` and `HS*` are rejected at construction and at decode.
//!
//! ## Example
//!
//! ```
//! use std::{sync::Arc, time::Duration};
//!
//! use tokengate_authn::{AuthError, Authenticator, Claims, Role, clock::FixedClock};
//! use tokengate_keys::{Algorithm, SigningKey, StaticKeyLookup};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let key = SigningKey::generate_ed25519("2026-10")?;
//! let lookup = StaticKeyLookup::new().with_key(key.public_key().clone())?;
//! let clock = Arc::new(FixedClock::new(1_700_000_000));
//! let auth = Authenticator::new(Algorithm::EdDSA, Arc::new(lookup), [key], Some("2026-10"))?
//!     .with_clock(clock.clone());
//!
//! let token = auth.issue_token(&Claims::new(
//!     "user-1",
//!     [Role::Admin],
//!     1_700_000_000,
//!     Duration::from_secs(3600),
//! ))?;
//! assert_eq!(auth.validate_token(&token).await?.sub, "user-1");
//!
//! clock.advance(Duration::from_secs(3600));
//! assert!(matches!(auth.validate_token(&token).await, Err(AuthError::TokenExpired)));
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod authenticator;
pub mod claims;
pub mod clock;
pub mod codec;
pub mod config;
pub mod error;
pub mod http;
pub mod key_cache;
pub mod middleware;
pub mod remote;
pub mod roles;
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used, clippy::panic)]
pub mod testutil;
pub mod validation;

pub use authenticator::Authenticator;
pub use claims::Claims;
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{AuthConfig, KeyConfig};
pub use error::{AccessError, AuthError, Result};
pub use key_cache::CachedKeyLookup;
pub use middleware::{RequestContext, RequireRole};
pub use remote::JwksKeyLookup;
pub use roles::{Role, UnknownRole};
