//! Security-focused validation tests.
//!
//! These tests exercise the validation pipeline against the usual attacks
//! on signed tokens: algorithm substitution and confusion, tampering, key
//! ID abuse, and stale keys after rotation.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::{sync::Arc, time::Duration};

use jsonwebtoken::{EncodingKey, Header};
use proptest::prelude::*;
use serde_json::json;
use tokengate_authn::{
    AuthError, Authenticator, Claims, Role, assert_auth_error,
    clock::FixedClock,
    testutil::{
        FIXTURE_NOW, authenticator_fixture, craft_signed_token, craft_unsigned_token, flip_byte,
    },
    validation::validate_algorithm,
};
use tokengate_keys::{
    Algorithm, StaticKeyLookup,
    testutil::{ed25519_signing_key, rotation_fixture, rsa_signing_key},
};

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime")
        .block_on(future)
}

fn admin_claims() -> Claims {
    Claims::new("user-1", [Role::Admin], FIXTURE_NOW, Duration::from_secs(3600))
}

// ===========================================================================
// 1. Algorithm substitution: `alg: "none"` must never validate
// ===========================================================================

#[test]
fn test_algorithm_none_rejected_at_construction() {
    let result = validate_algorithm("none");
    assert!(
        matches!(&result, Err(AuthError::InvalidConfiguration { message, .. }) if message.contains("forbidden")),
        "Security: 'none' must be rejected as forbidden, got: {result:?}"
    );
}

#[tokio::test]
async fn test_algorithm_none_token_rejected_end_to_end() {
    let (auth, _) = authenticator_fixture();
    let payload = serde_json::to_value(admin_claims()).unwrap();

    for alg in ["none", "None", "NONE"] {
        let token = craft_unsigned_token(&json!({"alg": alg, "typ": "JWT", "kid": "primary"}), &payload);
        let result = auth.validate_token(&token).await;
        assert_auth_error!(result, AlgorithmMismatch, format!("alg {alg}"));
    }
}

// ===========================================================================
// 2. Algorithm confusion: HS256 keyed with the public key
// ===========================================================================

#[rstest::rstest]
#[case("HS256")]
#[case("HS384")]
#[case("HS512")]
fn test_symmetric_algorithms_rejected_at_construction(#[case] alg: &str) {
    let result = validate_algorithm(alg);
    assert!(
        matches!(&result, Err(AuthError::InvalidConfiguration { message, .. }) if message.contains("forbidden")),
        "Security: {alg} must be rejected as forbidden, got: {result:?}"
    );
}

#[tokio::test]
async fn test_hs256_signed_with_public_key_rejected() {
    let (auth, _) = authenticator_fixture();
    let (set, _) = rotation_fixture();

    // The classic confusion attack: HMAC keyed with the verifier's public key.
    let jwks = serde_json::to_vec(&set.to_jwks()).unwrap();
    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some("primary".into());
    let token =
        jsonwebtoken::encode(&header, &admin_claims(), &EncodingKey::from_secret(&jwks)).unwrap();

    let result = auth.validate_token(&token).await;
    assert!(
        matches!(&result, Err(AuthError::AlgorithmMismatch { expected, found }) if expected == "RS256" && found == "HS256"),
        "Security: HS256 token must be rejected, got: {result:?}"
    );
}

#[tokio::test]
async fn test_other_asymmetric_algorithm_rejected() {
    let (auth, _) = authenticator_fixture();
    let key = rsa_signing_key("primary");

    // Same key material, different RSA padding scheme.
    let token = craft_signed_token(
        &json!({"alg": "PS256", "kid": "primary"}),
        &serde_json::to_value(admin_claims()).unwrap(),
        &key,
    );
    assert_auth_error!(auth.validate_token(&token).await, AlgorithmMismatch);
}

#[tokio::test]
async fn test_eddsa_token_against_rsa_authenticator() {
    let (auth, _) = authenticator_fixture();
    let ed = ed25519_signing_key("primary");
    let token = craft_signed_token(
        &json!({"alg": "EdDSA", "kid": "primary"}),
        &serde_json::to_value(admin_claims()).unwrap(),
        &ed,
    );
    assert_auth_error!(auth.validate_token(&token).await, AlgorithmMismatch);
}

// ===========================================================================
// 3. Key ID abuse
// ===========================================================================

#[rstest::rstest]
#[case::missing(json!({"alg": "RS256"}))]
#[case::empty(json!({"alg": "RS256", "kid": ""}))]
#[case::traversal(json!({"alg": "RS256", "kid": "../../etc/passwd"}))]
#[case::non_string(json!({"alg": "RS256", "kid": 42}))]
#[case::oversized(json!({"alg": "RS256", "kid": "k".repeat(129)}))]
#[tokio::test]
async fn test_bad_kid_is_malformed_before_lookup(#[case] header: serde_json::Value) {
    let (auth, _) = authenticator_fixture();
    let token = craft_signed_token(
        &header,
        &serde_json::to_value(admin_claims()).unwrap(),
        &rsa_signing_key("primary"),
    );
    assert_auth_error!(auth.validate_token(&token).await, MalformedToken);
}

#[tokio::test]
async fn test_kid_pointing_at_another_key_fails_signature() {
    let (auth, _) = authenticator_fixture();

    // Signed by `primary`, but claims to be `secondary`.
    let token = craft_signed_token(
        &json!({"alg": "RS256", "kid": "secondary"}),
        &serde_json::to_value(admin_claims()).unwrap(),
        &rsa_signing_key("primary"),
    );
    assert_auth_error!(auth.validate_token(&token).await, InvalidSignature);
}

#[tokio::test]
async fn test_fabricated_kid_is_key_not_found() {
    let (auth, _) = authenticator_fixture();
    let token = craft_signed_token(
        &json!({"alg": "RS256", "kid": "2019-legacy"}),
        &serde_json::to_value(admin_claims()).unwrap(),
        &rsa_signing_key("2019-legacy"),
    );
    let result = auth.validate_token(&token).await;
    assert!(
        matches!(&result, Err(AuthError::KeyNotFound { kid }) if kid == "2019-legacy"),
        "got: {result:?}"
    );
}

// ===========================================================================
// 4. Key rotation
// ===========================================================================

#[tokio::test]
async fn test_retired_key_validates_until_removed() {
    let (set, lookup) = rotation_fixture();
    let clock = Arc::new(FixedClock::new(FIXTURE_NOW));

    // Issued while `secondary` was the active key.
    let old_issuer = Authenticator::new(
        Algorithm::RS256,
        Arc::new(lookup.clone()),
        set.iter().cloned(),
        Some("secondary"),
    )
    .unwrap()
    .with_clock(clock.clone());
    let old_token = old_issuer.issue_token(&admin_claims()).unwrap();

    // Rotated: `primary` signs, `secondary` is retired but still published.
    let current = Authenticator::new(
        Algorithm::RS256,
        Arc::new(lookup.clone()),
        set.iter().cloned(),
        Some("primary"),
    )
    .unwrap()
    .with_clock(clock.clone());
    assert_eq!(current.validate_token(&old_token).await.unwrap().sub, "user-1");

    // Retirement complete: `secondary` is dropped from the lookup.
    let pruned: StaticKeyLookup = lookup.without_key("secondary");
    let after =
        Authenticator::verify_only(Algorithm::RS256, Arc::new(pruned)).unwrap().with_clock(clock);
    assert_auth_error!(after.validate_token(&old_token).await, KeyNotFound);

    let fresh = current.issue_token(&admin_claims()).unwrap();
    assert!(after.validate_token(&fresh).await.is_ok());
}

// ===========================================================================
// 5. Error messages carry no claim contents
// ===========================================================================

#[tokio::test]
async fn test_errors_do_not_echo_claims() {
    let (auth, clock) = authenticator_fixture();
    let claims =
        Claims::new("very-secret-subject", [Role::Owner], FIXTURE_NOW, Duration::from_secs(10));
    let token = auth.issue_token(&claims).unwrap();

    clock.advance(Duration::from_secs(10));
    let err = auth.validate_token(&token).await.unwrap_err();
    assert!(matches!(err, AuthError::TokenExpired));
    assert!(!err.to_string().contains("very-secret-subject"));
    assert!(!format!("{err:?}").contains("very-secret-subject"));

    let tampered = flip_byte(&token, 1, 5);
    let err = auth.validate_token(&tampered).await.unwrap_err();
    assert!(!err.to_string().contains("very-secret-subject"));
}

// ===========================================================================
// 6. Properties
// ===========================================================================

fn arb_role_name() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("admin".to_owned()),
        Just("owner".to_owned()),
        Just("user".to_owned()),
        Just("viewer".to_owned()),
        "[a-z]{1,12}",
    ]
}

fn arb_claims() -> impl Strategy<Value = Claims> {
    (
        "[a-zA-Z0-9:_@.-]{1,64}",                                // sub
        proptest::option::of("https://[a-z]{1,16}\\.example"),   // iss
        proptest::option::of("[a-z-]{1,24}"),                    // aud
        proptest::collection::vec(arb_role_name(), 0..6),        // roles
        0u64..86_400,                                            // age at FIXTURE_NOW
        1u64..86_400,                                            // remaining lifetime
    )
        .prop_map(|(sub, iss, aud, roles, age, remaining)| Claims {
            iss,
            sub,
            aud,
            iat: FIXTURE_NOW - age,
            exp: FIXTURE_NOW + remaining,
            roles,
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Validating an issued token returns the issued claims, field for
    /// field, including role order and duplicates.
    #[test]
    fn prop_issue_validate_round_trip(claims in arb_claims()) {
        let (auth, _) = authenticator_fixture();
        let token = auth.issue_token(&claims).expect("issue");
        let decoded = block_on(auth.validate_token(&token)).expect("validate");
        prop_assert_eq!(decoded, claims);
    }

    /// Flipping any single byte of the payload or signature segment yields
    /// `InvalidSignature`.
    #[test]
    fn prop_tampering_is_invalid_signature(
        claims in arb_claims(),
        segment in 1usize..=2,
        offset in any::<usize>(),
    ) {
        let (auth, _) = authenticator_fixture();
        let token = auth.issue_token(&claims).expect("issue");
        let tampered = flip_byte(&token, segment, offset);

        let result = block_on(auth.validate_token(&tampered));
        prop_assert!(
            matches!(result, Err(AuthError::InvalidSignature)),
            "segment {} offset {}: {:?}", segment, offset, result
        );
    }

    /// Expiry is exclusive: the token is valid one second before `exp` and
    /// expired from `exp` on.
    #[test]
    fn prop_expiry_boundary(lifetime in 1u64..1_000_000) {
        let (auth, clock) = authenticator_fixture();
        let claims = Claims::new("u", [Role::User], FIXTURE_NOW, Duration::from_secs(lifetime));
        let token = auth.issue_token(&claims).expect("issue");

        clock.set(claims.exp - 1);
        prop_assert!(block_on(auth.validate_token(&token)).is_ok());

        clock.set(claims.exp);
        prop_assert!(matches!(block_on(auth.validate_token(&token)), Err(AuthError::TokenExpired)));
    }
}
