//! Raw-input fuzzing of token validation.
//!
//! Any string must come back as an `AuthError`; a panic or an `Ok` for
//! unsigned input is a bug.

#![no_main]

use std::sync::OnceLock;

use libfuzzer_sys::fuzz_target;
use tokengate_authn::{Authenticator, testutil::authenticator_fixture};
use tokio::runtime::Runtime;

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

fuzz_target!(|data: &[u8]| {
    let Ok(token) = std::str::from_utf8(data) else {
        return;
    };

    let (runtime, auth) = harness();
    let result = runtime.block_on(auth.validate_token(token));
    assert!(result.is_err(), "forged token accepted: {token:?}");
});
