//! Structured fuzzing of token validation.
//!
//! Builds three-segment tokens with plausible headers and payloads so the
//! fuzzer gets past base64 and JSON parsing and into the algorithm, `kid`
//! and signature checks.

#![no_main]

use std::sync::OnceLock;

use arbitrary::Arbitrary;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use libfuzzer_sys::fuzz_target;
use serde_json::{Map, Value, json};
use tokengate_authn::{AuthError, Authenticator, testutil::authenticator_fixture};
use tokio::runtime::Runtime;

#[derive(Debug, Arbitrary)]
struct FuzzedToken {
    alg: FuzzedAlg,
    kid: Option<String>,
    crit: bool,
    sub: String,
    roles: Vec<String>,
    iat: u64,
    exp: u64,
    iss: Option<String>,
    aud: Option<String>,
    signature: Vec<u8>,
}

#[derive(Debug, Arbitrary)]
enum FuzzedAlg {
    Rs256,
    EdDsa,
    Ps256,
    None,
    Hs256,
    Other(String),
}

impl FuzzedAlg {
    fn as_str(&self) -> &str {
        match self {
            Self::Rs256 => "RS256",
            Self::EdDsa => "EdDSA",
            Self::Ps256 => "PS256",
            Self::None => "none",
            Self::Hs256 => "HS256",
            Self::Other(name) => name,
        }
    }
}

impl FuzzedToken {
    fn to_compact(&self) -> String {
        let mut header = Map::new();
        header.insert("alg".into(), json!(self.alg.as_str()));
        if let Some(kid) = &self.kid {
            header.insert("kid".into(), json!(kid));
        }
        if self.crit {
            header.insert("crit".into(), json!(["exp"]));
        }

        let mut payload = Map::new();
        payload.insert("sub".into(), json!(self.sub));
        payload.insert("roles".into(), json!(self.roles));
        payload.insert("iat".into(), json!(self.iat));
        payload.insert("exp".into(), json!(self.exp));
        if let Some(iss) = &self.iss {
            payload.insert("iss".into(), json!(iss));
        }
        if let Some(aud) = &self.aud {
            payload.insert("aud".into(), json!(aud));
        }

        let encode = |value: Value| URL_SAFE_NO_PAD.encode(value.to_string());
        format!(
            "{}.{}.{}",
            encode(Value::Object(header)),
            encode(Value::Object(payload)),
            URL_SAFE_NO_PAD.encode(&self.signature)
        )
    }
}

fn harness() -> &'static (Runtime, Authenticator) {
    static HARNESS: OnceLock<(Runtime, Authenticator)> = OnceLock::new();
    HARNESS.get_or_init(|| {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .expect("runtime");
        let (auth, _clock) = authenticator_fixture();
        (runtime, auth)
    })
}

fuzz_target!(|input: FuzzedToken| {
    let token = input.to_compact();
    let (runtime, auth) = harness();

    match runtime.block_on(auth.validate_token(&token)) {
        Ok(claims) => panic!("forged token accepted: {claims:?}"),
        Err(AuthError::AlgorithmMismatch { expected, .. }) => assert_eq!(expected, "RS256"),
        Err(_) => {},
    }
});
