//! JWS compact token encoding and verified decoding.
//!
//! # Decode pipeline
//!
//! ```text
//! token ─► length guard ─► split header.payload.signature ─► parse header
//!       ─► alg == configured? ─► kid well-formed? ─► lookup public key
//!       ─► verify signature over "header.payload" ─► parse claims ─► expiry
//! ```
//!
//! Every step fails closed and nothing from the payload is trusted before
//! the signature has been verified. The header is parsed by hand rather
//! than through `jsonwebtoken::decode_header` so that `alg` values the
//! library cannot represent (`"none"`, unknown names) surface as
//! [`AuthError::AlgorithmMismatch`] instead of a generic parse failure.

use std::{fmt, sync::Arc, time::Duration};

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::Header;
use serde::Deserialize;
use tokengate_keys::{
    Algorithm, PublicKey, PublicKeyLookup, SigningKey, algorithm_name, key_id::validate_key_id,
};

use crate::{
    claims::Claims,
    error::{AuthError, Result},
};

/// Tokens longer than this are rejected before any parsing.
pub const MAX_TOKEN_BYTES: usize = 16 * 1024;

/// Longest header `alg` value echoed back in an error.
const MAX_REPORTED_ALG_CHARS: usize = 32;

#[derive(Deserialize)]
struct RawHeader {
    alg: String,
    #[serde(default)]
    kid: Option<String>,
    #[serde(default)]
    crit: Option<serde_json::Value>,
}

/// Encodes claims into signed tokens and decodes tokens back into verified
/// claims, under one fixed asymmetric algorithm.
#[derive(Clone)]
pub struct TokenCodec {
    algorithm: Algorithm,
    lookup: Arc<dyn PublicKeyLookup>,
    lookup_timeout: Option<Duration>,
}

impl TokenCodec {
    /// Creates a codec for `algorithm` resolving keys through `lookup`.
    #[must_use]
    pub fn new(algorithm: Algorithm, lookup: Arc<dyn PublicKeyLookup>) -> Self {
        Self { algorithm, lookup, lookup_timeout: None }
    }

    /// Bounds each public key lookup by `timeout`.
    #[must_use]
    pub fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = Some(timeout);
        self
    }

    /// Returns the configured algorithm.
    #[must_use]
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Returns the configured lookup timeout.
    #[must_use]
    pub fn lookup_timeout(&self) -> Option<Duration> {
        self.lookup_timeout
    }

    /// Signs `claims` with `key`, embedding its key ID and the algorithm in
    /// the header.
    ///
    /// Claims serialize in field order. `RS*` and `EdDSA` signatures are
    /// deterministic, so equal inputs give equal tokens; `PS*` signatures
    /// are salted and differ between calls.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidConfiguration`] if the key's algorithm
    /// differs from the codec's or the signer rejects the key.
    pub fn encode(&self, claims: &Claims, key: &SigningKey) -> Result<String> {
        if key.algorithm() != self.algorithm {
            return Err(AuthError::invalid_configuration(format!(
                "signing key '{}' is {}, codec is {}",
                key.kid(),
                algorithm_name(key.algorithm()),
                algorithm_name(self.algorithm)
            )));
        }

        let mut header = Header::new(self.algorithm);
        header.kid = Some(key.kid().to_string());

        jsonwebtoken::encode(&header, claims, key.encoding_key()).map_err(|e| {
            AuthError::invalid_configuration(format!("signing with '{}' failed: {e}", key.kid()))
        })
    }

    /// Verifies `token` and returns its claims.
    ///
    /// `now` is the current time in seconds since the Unix epoch; the token
    /// is expired when `now >= exp`.
    ///
    /// # Errors
    ///
    /// - [`AuthError::MalformedToken`] if the token, header, `kid` or payload cannot be parsed
    /// - [`AuthError::AlgorithmMismatch`] if the header or the resolved key declares another
    ///   algorithm
    /// - [`AuthError::KeyNotFound`], [`AuthError::KeyLookupTimeout`],
    ///   [`AuthError::KeyLookupUnavailable`], [`AuthError::InvalidPublicKey`] from the lookup
    /// - [`AuthError::InvalidSignature`] if the signature does not verify
    /// - [`AuthError::TokenExpired`] if `now >= exp`
    pub async fn decode(&self, token: &str, now: u64) -> Result<Claims> {
        let (signing_input, header, payload, signature) = split_token(token)?;

        let raw_header = parse_header(header)?;
        let expected = algorithm_name(self.algorithm);
        if raw_header.alg != expected {
            let found: String = raw_header.alg.chars().take(MAX_REPORTED_ALG_CHARS).collect();
            return Err(AuthError::algorithm_mismatch(expected, found));
        }
        if raw_header.crit.is_some() {
            return Err(AuthError::malformed("critical header parameters are not supported"));
        }

        let kid = raw_header.kid.ok_or_else(|| AuthError::malformed("header is missing 'kid'"))?;
        validate_key_id(&kid).map_err(|e| AuthError::malformed(e.to_string()))?;

        let key = self.resolve_key(&kid).await?;
        if key.algorithm() != self.algorithm {
            return Err(AuthError::algorithm_mismatch(expected, algorithm_name(key.algorithm())));
        }

        if !key.verify(signing_input.as_bytes(), signature) {
            return Err(AuthError::InvalidSignature);
        }

        let claims = parse_claims(payload)?;
        if claims.is_expired_at(now) {
            return Err(AuthError::TokenExpired);
        }

        Ok(claims)
    }

    async fn resolve_key(&self, kid: &str) -> Result<Arc<PublicKey>> {
        let lookup = self.lookup.public_key_for(kid);
        let result = match self.lookup_timeout {
            Some(timeout) => tokio::time::timeout(timeout, lookup)
                .await
                .map_err(|_| AuthError::KeyLookupTimeout)?,
            None => lookup.await,
        };
        Ok(result?)
    }
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("algorithm", &self.algorithm)
            .field("lookup_timeout", &self.lookup_timeout)
            .finish_non_exhaustive()
    }
}

/// Splits a compact JWS into `(signing_input, header, payload, signature)`.
fn split_token(token: &str) -> Result<(&str, &str, &str, &str)> {
    if token.len() > MAX_TOKEN_BYTES {
        return Err(AuthError::malformed(format!("token exceeds {MAX_TOKEN_BYTES} bytes")));
    }

    let mut segments = token.split('.');
    let (Some(header), Some(payload), Some(signature), None) =
        (segments.next(), segments.next(), segments.next(), segments.next())
    else {
        return Err(AuthError::malformed("expected three '.'-separated segments"));
    };

    let signing_input = &token[..header.len() + 1 + payload.len()];
    Ok((signing_input, header, payload, signature))
}

fn parse_header(segment: &str) -> Result<RawHeader> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| AuthError::malformed("header is not base64url"))?;
    serde_json::from_slice(&bytes).map_err(|_| AuthError::malformed("header is not a JOSE header"))
}

fn parse_claims(segment: &str) -> Result<Claims> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| AuthError::malformed("payload is not base64url"))?;
    serde_json::from_slice(&bytes).map_err(|_| AuthError::malformed("payload is not a claims set"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use std::time::Duration;

    use rstest::rstest;
    use tokengate_keys::{
        StaticKeyLookup,
        testutil::{ed25519_signing_key, rsa_secondary_signing_key, rsa_signing_key},
    };

    use super::*;
    use crate::roles::Role;

    const NOW: u64 = 1_700_000_000;

    fn claims() -> Claims {
        Claims::new("user-1", [Role::Admin, Role::Viewer], NOW, Duration::from_secs(3600))
    }

    fn rsa_codec() -> (TokenCodec, SigningKey) {
        let key = rsa_signing_key("rsa-1");
        let lookup = StaticKeyLookup::new().with_key(key.public_key().clone()).unwrap();
        (TokenCodec::new(Algorithm::RS256, Arc::new(lookup)), key)
    }

    fn b64(value: &serde_json::Value) -> String {
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(value).unwrap())
    }

    #[tokio::test]
    async fn test_round_trip() {
        let (codec, key) = rsa_codec();
        let token = codec.encode(&claims(), &key).unwrap();

        assert_eq!(token.split('.').count(), 3);
        assert_eq!(codec.decode(&token, NOW).await.unwrap(), claims());
    }

    #[tokio::test]
    async fn test_rs256_encoding_is_deterministic() {
        let (codec, key) = rsa_codec();
        assert_eq!(codec.encode(&claims(), &key).unwrap(), codec.encode(&claims(), &key).unwrap());
    }

    #[tokio::test]
    async fn test_header_carries_kid_and_alg() {
        let (codec, key) = rsa_codec();
        let token = codec.encode(&claims(), &key).unwrap();

        let header = jsonwebtoken::decode_header(&token).unwrap();
        assert_eq!(header.alg, Algorithm::RS256);
        assert_eq!(header.kid.as_deref(), Some("rsa-1"));
    }

    #[tokio::test]
    async fn test_eddsa_round_trip() {
        let key = ed25519_signing_key("ed-1");
        let lookup = StaticKeyLookup::new().with_key(key.public_key().clone()).unwrap();
        let codec = TokenCodec::new(Algorithm::EdDSA, Arc::new(lookup));

        let token = codec.encode(&claims(), &key).unwrap();
        assert_eq!(codec.decode(&token, NOW).await.unwrap(), claims());
    }

    #[tokio::test]
    async fn test_encode_rejects_key_for_other_algorithm() {
        let (codec, _) = rsa_codec();
        let ed = ed25519_signing_key("ed-1");

        let err = codec.encode(&claims(), &ed).unwrap_err();
        assert!(matches!(err, AuthError::InvalidConfiguration { .. }));
    }

    #[tokio::test]
    async fn test_expiry_boundary() {
        let (codec, key) = rsa_codec();
        let token = codec.encode(&claims(), &key).unwrap();
        let exp = claims().exp;

        assert!(codec.decode(&token, exp - 1).await.is_ok());
        assert!(matches!(codec.decode(&token, exp).await, Err(AuthError::TokenExpired)));
        assert!(matches!(codec.decode(&token, exp + 1).await, Err(AuthError::TokenExpired)));
    }

    #[tokio::test]
    async fn test_unknown_kid() {
        let (codec, _) = rsa_codec();
        let stranger = rsa_signing_key("retired-7");
        let token = codec.encode(&claims(), &stranger).unwrap();

        let err = codec.decode(&token, NOW).await.unwrap_err();
        assert!(matches!(err, AuthError::KeyNotFound { ref kid } if kid == "retired-7"));
    }

    #[tokio::test]
    async fn test_signature_from_other_key_with_same_kid() {
        let (codec, _) = rsa_codec();
        let impostor = rsa_secondary_signing_key("rsa-1");
        let token = codec.encode(&claims(), &impostor).unwrap();

        assert!(matches!(codec.decode(&token, NOW).await, Err(AuthError::InvalidSignature)));
    }

    #[rstest]
    #[case("none")]
    #[case("HS256")]
    #[case("RS512")]
    #[case("EdDSA")]
    #[tokio::test]
    async fn test_algorithm_confusion(#[case] alg: &str) {
        let (codec, key) = rsa_codec();
        let token = codec.encode(&claims(), &key).unwrap();
        let rest = token.split_once('.').unwrap().1;

        let forged = format!("{}.{rest}", b64(&serde_json::json!({ "alg": alg, "kid": "rsa-1" })));
        let err = codec.decode(&forged, NOW).await.unwrap_err();

        assert!(
            matches!(err, AuthError::AlgorithmMismatch { ref found, .. } if found == alg),
            "got {err:?}"
        );
    }

    #[tokio::test]
    async fn test_key_algorithm_must_match() {
        // The lookup returns an EdDSA key under the kid an RS256 token names.
        let ed = ed25519_signing_key("rsa-1");
        let lookup = StaticKeyLookup::new().with_key(ed.public_key().clone()).unwrap();
        let codec = TokenCodec::new(Algorithm::RS256, Arc::new(lookup));
        let token = codec.encode(&claims(), &rsa_signing_key("rsa-1")).unwrap();

        let err = codec.decode(&token, NOW).await.unwrap_err();
        assert!(matches!(err, AuthError::AlgorithmMismatch { ref found, .. } if found == "EdDSA"));
    }

    #[rstest]
    #[case("")]
    #[case("abc")]
    #[case("a.b")]
    #[case("a.b.c.d")]
    #[case("!!!.e30.sig")]
    #[case("e30.e30.sig")]
    #[tokio::test]
    async fn test_malformed_structure(#[case] token: &str) {
        let (codec, _) = rsa_codec();
        let err = codec.decode(token, NOW).await.unwrap_err();
        assert!(matches!(err, AuthError::MalformedToken(_)), "{token:?} gave {err:?}");
    }

    #[rstest]
    #[case(serde_json::json!({ "alg": "RS256" }))]
    #[case(serde_json::json!({ "alg": "RS256", "kid": "" }))]
    #[case(serde_json::json!({ "alg": "RS256", "kid": "../../etc/passwd" }))]
    #[case(serde_json::json!({ "alg": "RS256", "kid": 7 }))]
    #[case(serde_json::json!({ "alg": "RS256", "kid": "rsa-1", "crit": ["exp"] }))]
    #[tokio::test]
    async fn test_malformed_headers(#[case] header: serde_json::Value) {
        let (codec, _) = rsa_codec();
        let token = format!("{}.e30.c2ln", b64(&header));
        let err = codec.decode(&token, NOW).await.unwrap_err();
        assert!(matches!(err, AuthError::MalformedToken(_)), "{header} gave {err:?}");
    }

    #[tokio::test]
    async fn test_long_alg_is_truncated_in_error() {
        let (codec, _) = rsa_codec();
        let alg = "X".repeat(500);
        let token = format!("{}.e30.c2ln", b64(&serde_json::json!({ "alg": alg, "kid": "rsa-1" })));

        let err = codec.decode(&token, NOW).await.unwrap_err();
        assert!(matches!(err, AuthError::AlgorithmMismatch { ref found, .. } if found.len() == 32));
    }

    #[tokio::test]
    async fn test_oversized_token() {
        let (codec, _) = rsa_codec();
        let token = format!("{}.e30.c2ln", "a".repeat(MAX_TOKEN_BYTES));
        assert!(matches!(codec.decode(&token, NOW).await, Err(AuthError::MalformedToken(_))));
    }

    #[tokio::test]
    async fn test_signed_garbage_payload_is_malformed_after_verification() {
        let (codec, key) = rsa_codec();
        let header = b64(&serde_json::json!({ "alg": "RS256", "kid": "rsa-1", "typ": "JWT" }));
        let payload = URL_SAFE_NO_PAD.encode(b"not json");
        let signing_input = format!("{header}.{payload}");
        let signature = key.sign(signing_input.as_bytes()).unwrap();

        let err = codec.decode(&format!("{signing_input}.{signature}"), NOW).await.unwrap_err();
        assert!(matches!(err, AuthError::MalformedToken(_)));
    }

    #[tokio::test]
    async fn test_unsigned_garbage_payload_is_invalid_signature() {
        let (codec, key) = rsa_codec();
        let token = codec.encode(&claims(), &key).unwrap();
        let parts: Vec<&str> = token.split('.').collect();

        let forged = format!("{}.{}.{}", parts[0], URL_SAFE_NO_PAD.encode(b"not json"), parts[2]);
        assert!(matches!(codec.decode(&forged, NOW).await, Err(AuthError::InvalidSignature)));
    }

    #[tokio::test]
    async fn test_lookup_timeout() {
        struct SlowLookup;

        #[async_trait::async_trait]
        impl PublicKeyLookup for SlowLookup {
            async fn public_key_for(
                &self,
                _kid: &str,
            ) -> std::result::Result<Arc<PublicKey>, tokengate_keys::KeyLookupError> {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Err(tokengate_keys::KeyLookupError::not_found("never"))
            }
        }

        let key = rsa_signing_key("rsa-1");
        let codec = TokenCodec::new(Algorithm::RS256, Arc::new(SlowLookup))
            .with_lookup_timeout(Duration::from_millis(20));
        let token = codec.encode(&claims(), &key).unwrap();

        let err = codec.decode(&token, NOW).await.unwrap_err();
        assert!(matches!(err, AuthError::KeyLookupTimeout));
        assert!(err.is_retryable());
    }
}
