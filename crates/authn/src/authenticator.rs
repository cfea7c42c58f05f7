//! Token issuance and validation behind one entry point.

use std::{fmt, sync::Arc, time::Duration};

use tokengate_keys::{
    Algorithm, JwkSet, KeyId, KeySet, PublicKeyLookup, SigningKey, algorithm_name,
};

use crate::{
    claims::Claims,
    clock::{Clock, SystemClock},
    codec::TokenCodec,
    error::{AuthError, Result},
    validation::{ClaimsPolicy, validate_for_issue},
};

/// Issues and validates tokens under one algorithm.
///
/// An `Authenticator` holds the private key set used for issuance and the
/// public key lookup used for validation. The two are independent: a
/// validating service can run with a lookup backed by a remote JWK Set and
/// no private keys at all (see [`verify_only`](Self::verify_only)).
///
/// `Authenticator` is immutable after construction and can be shared
/// across tasks behind an `Arc`.
///
/// # Examples
///
/// ```
/// use std::{sync::Arc, time::Duration};
///
/// use tokengate_authn::{
///     Authenticator, Claims, Role,
///     clock::{Clock, FixedClock},
/// };
/// use tokengate_keys::{Algorithm, SigningKey, StaticKeyLookup};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let key = SigningKey::generate_ed25519("2026-10")?;
/// let lookup = StaticKeyLookup::new().with_key(key.public_key().clone())?;
/// let clock = Arc::new(FixedClock::new(1_700_000_000));
///
/// let auth = Authenticator::new(Algorithm::EdDSA, Arc::new(lookup), [key], Some("2026-10"))?
///     .with_clock(clock.clone());
///
/// let claims = Claims::new("user-1", [Role::Admin], clock.now(), Duration::from_secs(3600));
/// let token = auth.issue_token(&claims)?;
/// assert_eq!(auth.validate_token(&token).await?.sub, "user-1");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Authenticator {
    codec: TokenCodec,
    signing_keys: Option<KeySet>,
    clock: Arc<dyn Clock>,
    policy: ClaimsPolicy,
}

impl Authenticator {
    /// Builds an authenticator.
    ///
    /// `active_kid` selects the key that signs new tokens. With no signing
    /// keys and no active key ID the authenticator only validates.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidConfiguration`] if:
    /// - `algorithm` is not a supported asymmetric algorithm
    /// - a signing key uses a different algorithm
    /// - signing keys are given without an active key ID, or the active key ID is absent from them
    /// - two signing keys share a key ID
    pub fn new(
        algorithm: Algorithm,
        lookup: Arc<dyn PublicKeyLookup>,
        signing_keys: impl IntoIterator<Item = SigningKey>,
        active_kid: Option<&str>,
    ) -> Result<Self> {
        tokengate_keys::algorithm::key_family(algorithm)?;

        let keys: Vec<SigningKey> = signing_keys.into_iter().collect();
        if let Some(key) = keys.iter().find(|key| key.algorithm() != algorithm) {
            return Err(AuthError::invalid_configuration(format!(
                "signing key '{}' is {}, authenticator is {}",
                key.kid(),
                algorithm_name(key.algorithm()),
                algorithm_name(algorithm)
            )));
        }

        let signing_keys = match (keys.is_empty(), active_kid) {
            (true, None) => None,
            (false, None) => {
                return Err(AuthError::invalid_configuration(
                    "signing keys are configured but no active key ID is set",
                ));
            },
            (_, Some(active)) => Some(KeySet::new(keys, active)?),
        };

        Ok(Self {
            codec: TokenCodec::new(algorithm, lookup),
            signing_keys,
            clock: Arc::new(SystemClock),
            policy: ClaimsPolicy::default(),
        })
    }

    /// Builds an authenticator that validates but cannot issue.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidConfiguration`] if `algorithm` is not a
    /// supported asymmetric algorithm.
    pub fn verify_only(algorithm: Algorithm, lookup: Arc<dyn PublicKeyLookup>) -> Result<Self> {
        Self::new(algorithm, lookup, Vec::new(), None)
    }

    /// Replaces the time source.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Bounds each public key lookup by `timeout`.
    #[must_use]
    pub fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.codec = self.codec.with_lookup_timeout(timeout);
        self
    }

    /// Requires validated tokens to carry `iss == issuer`.
    #[must_use]
    pub fn with_expected_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.policy.issuer = Some(issuer.into());
        self
    }

    /// Requires validated tokens to carry `aud == audience`.
    #[must_use]
    pub fn with_expected_audience(mut self, audience: impl Into<String>) -> Self {
        self.policy.audience = Some(audience.into());
        self
    }

    /// Signs `claims` with the active key.
    ///
    /// Claims are not modified. They must have a non-empty subject and
    /// `exp > iat`.
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidConfiguration`] if no active signing key is set
    /// - [`AuthError::InvalidClaims`] if the claims are structurally invalid
    #[tracing::instrument(skip(self, claims), fields(kid = tracing::field::Empty))]
    pub fn issue_token(&self, claims: &Claims) -> Result<String> {
        let keys = self
            .signing_keys
            .as_ref()
            .ok_or_else(|| AuthError::invalid_configuration("no active signing key"))?;
        validate_for_issue(claims)?;

        let key = keys.active();
        tracing::Span::current().record("kid", key.kid().as_str());

        let token = self.codec.encode(claims, key)?;
        tracing::debug!(exp = claims.exp, "Issued token");
        Ok(token)
    }

    /// Verifies `token` and returns its claims.
    ///
    /// This is the trust boundary: codec errors surface unchanged, followed
    /// by the issuer and audience checks when configured.
    ///
    /// # Errors
    ///
    /// Any error from [`TokenCodec::decode`], plus
    /// [`AuthError::InvalidIssuer`] and [`AuthError::InvalidAudience`].
    #[tracing::instrument(skip_all)]
    pub async fn validate_token(&self, token: &str) -> Result<Claims> {
        let claims = self.codec.decode(token, self.clock.now()).await?;
        self.policy.check(&claims)?;
        tracing::debug!("Token validated");
        Ok(claims)
    }

    /// Returns the configured algorithm.
    #[must_use]
    pub fn algorithm(&self) -> Algorithm {
        self.codec.algorithm()
    }

    /// Returns the active signing key ID, if this authenticator can issue.
    #[must_use]
    pub fn active_kid(&self) -> Option<&KeyId> {
        self.signing_keys.as_ref().map(KeySet::active_kid)
    }

    /// Returns the current time according to the configured clock.
    #[must_use]
    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    /// Exports the public halves of the signing keys for publication.
    #[must_use]
    pub fn jwks(&self) -> Option<JwkSet> {
        self.signing_keys.as_ref().map(KeySet::to_jwks)
    }
}

impl fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Authenticator")
            .field("codec", &self.codec)
            .field("active_kid", &self.active_kid())
            .field("clock", &self.clock)
            .field("policy", &self.policy)
            .finish()
    }
}
