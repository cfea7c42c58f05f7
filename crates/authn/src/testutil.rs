//! Shared helpers for authentication tests.
//!
//! Feature-gated behind `testutil` so nothing here reaches production
//! builds. Enable it from a dev-dependency:
//!
//! ```toml
//! [dev-dependencies]
//! tokengate-authn = { workspace = true, features = ["testutil"] }
//! ```
//!
//! Key fixtures live in `tokengate_keys::testutil`; this module adds token
//! crafting, a ready-made [`Authenticator`], a scriptable lookup, and the
//! [`assert_auth_error!`](crate::assert_auth_error) macro.

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use parking_lot::Mutex;
use tokengate_keys::{
    Algorithm, KeyLookupError, PublicKey, PublicKeyLookup, SigningKey, StaticKeyLookup,
    testutil::rotation_fixture,
};

use crate::{authenticator::Authenticator, clock::FixedClock};

/// The instant [`authenticator_fixture`] starts its clock at.
pub const FIXTURE_NOW: u64 = 1_700_000_000;

/// Builds an RS256 [`Authenticator`] over the `primary`/`secondary` rotation
/// fixture, signing with `primary`, on a [`FixedClock`] at [`FIXTURE_NOW`].
///
/// # Panics
///
/// Panics if the fixture keys fail to load.
pub fn authenticator_fixture() -> (Authenticator, Arc<FixedClock>) {
    let (set, lookup) = rotation_fixture();
    let clock = Arc::new(FixedClock::new(FIXTURE_NOW));
    let auth = Authenticator::new(
        Algorithm::RS256,
        Arc::new(lookup),
        set.iter().cloned(),
        Some(set.active_kid().as_str()),
    )
    .expect("fixture authenticator must build")
    .with_clock(clock.clone());
    (auth, clock)
}

/// Builds an `http::Request` carrying `Authorization: Bearer <token>`.
///
/// # Panics
///
/// Panics if `token` is not a valid header value.
pub fn bearer_request(token: &str) -> http::Request<()> {
    http::Request::builder()
        .header(http::header::AUTHORIZATION, format!("Bearer {token}"))
        .body(())
        .expect("bearer request must build")
}

/// Base64url-encodes a JSON value without padding.
///
/// # Panics
///
/// Panics if JSON serialization fails.
pub fn encode_segment(value: &serde_json::Value) -> String {
    URL_SAFE_NO_PAD.encode(serde_json::to_vec(value).expect("segment json"))
}

/// Assembles a compact token from arbitrary header and payload JSON with
/// an empty signature segment.
pub fn craft_unsigned_token(header: &serde_json::Value, payload: &serde_json::Value) -> String {
    format!("{}.{}.", encode_segment(header), encode_segment(payload))
}

/// Assembles a compact token from arbitrary header and payload JSON and
/// signs it with `key`, bypassing every check the codec makes on issue.
///
/// # Panics
///
/// Panics if signing fails.
pub fn craft_signed_token(
    header: &serde_json::Value,
    payload: &serde_json::Value,
    key: &SigningKey,
) -> String {
    let signing_input = format!("{}.{}", encode_segment(header), encode_segment(payload));
    let signature = key.sign(signing_input.as_bytes()).expect("fixture key must sign");
    format!("{signing_input}.{signature}")
}

/// Flips the low bit of the byte at `offset` within segment `segment`
/// (0 = header, 1 = payload, 2 = signature). `offset` wraps around the
/// segment length.
///
/// # Panics
///
/// Panics if the token does not have three segments or the segment is
/// empty.
pub fn flip_byte(token: &str, segment: usize, offset: usize) -> String {
    let segments: Vec<&str> = token.split('.').collect();
    assert_eq!(segments.len(), 3, "token must have three segments");

    let start: usize = segments[..segment].iter().map(|s| s.len() + 1).sum();
    let len = segments[segment].len();
    assert!(len > 0, "segment {segment} is empty");

    let mut bytes = token.as_bytes().to_vec();
    bytes[start + offset % len] ^= 0x01;
    String::from_utf8(bytes).expect("flipping the low bit of ASCII stays ASCII")
}

/// A [`PublicKeyLookup`] over a [`StaticKeyLookup`] that counts calls and can
/// be told to fail or stall.
#[derive(Debug)]
pub struct ScriptedLookup {
    inner: StaticKeyLookup,
    calls: AtomicUsize,
    failure: Mutex<Option<KeyLookupError>>,
    delay: Mutex<Option<Duration>>,
}

impl ScriptedLookup {
    /// Wraps `inner`.
    #[must_use]
    pub fn new(inner: StaticKeyLookup) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
            failure: Mutex::new(None),
            delay: Mutex::new(None),
        }
    }

    /// Makes every subsequent lookup fail with `error`, or succeed again
    /// with `None`.
    pub fn fail_with(&self, error: Option<KeyLookupError>) {
        *self.failure.lock() = error;
    }

    /// Delays every subsequent lookup by `delay`.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    /// Returns the number of lookups made so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PublicKeyLookup for ScriptedLookup {
    async fn public_key_for(&self, kid: &str) -> Result<Arc<PublicKey>, KeyLookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let failure = self.failure.lock().clone();
        if let Some(err) = failure {
            return Err(err);
        }
        self.inner.public_key_for(kid).await
    }
}

/// Asserts that a `Result<T, AuthError>` is an `Err` of the given
/// [`AuthError`](crate::AuthError) variant.
///
/// # Examples
///
/// ```
/// use tokengate_authn::{AuthError, assert_auth_error};
///
/// let result: Result<(), AuthError> = Err(AuthError::TokenExpired);
/// assert_auth_error!(result, TokenExpired);
/// ```
#[macro_export]
macro_rules! assert_auth_error {
    ($result:expr, $variant:ident) => {
        assert!(
            matches!($result, Err($crate::error::AuthError::$variant { .. })),
            "expected AuthError::{}, got: {:?}",
            stringify!($variant),
            $result,
        );
    };
    ($result:expr, $variant:ident, $msg:expr) => {
        assert!(
            matches!($result, Err($crate::error::AuthError::$variant { .. })),
            "{}: expected AuthError::{}, got: {:?}",
            $msg,
            stringify!($variant),
            $result,
        );
    };
}
