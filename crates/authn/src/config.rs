//! Authenticator configuration.
//!
//! [`AuthConfig`] can be deserialized from a service's configuration file or
//! built in code through its builder. Either way,
//! [`Authenticator::from_config`] re-validates it before building anything.

use std::{fmt, path::PathBuf, sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use tokengate_keys::{Algorithm, PublicKeyLookup, SigningKey, StaticKeyLookup, signing_key};

use crate::{
    authenticator::Authenticator,
    error::{AuthError, Result},
    key_cache::CachedKeyLookup,
    remote::JwksKeyLookup,
    validation::validate_algorithm,
};

/// Default algorithm name.
const DEFAULT_ALGORITHM: &str = "RS256";

/// Default bound on a single public key lookup (5 seconds).
const DEFAULT_KEY_LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Default TTL for keys fetched from a remote JWK Set (5 minutes).
const DEFAULT_JWKS_CACHE_TTL: Duration = Duration::from_secs(300);

fn default_algorithm() -> String {
    DEFAULT_ALGORITHM.to_owned()
}

fn default_key_lookup_timeout() -> Duration {
    DEFAULT_KEY_LOOKUP_TIMEOUT
}

fn default_jwks_cache_ttl() -> Duration {
    DEFAULT_JWKS_CACHE_TTL
}

/// One private signing key.
///
/// Exactly one of `private_key_pem` and `private_key_path` must be set.
#[derive(Clone, Serialize, Deserialize, bon::Builder)]
#[serde(deny_unknown_fields)]
pub struct KeyConfig {
    /// Key ID published in token headers.
    #[builder(into)]
    pub kid: String,

    /// Inline PEM (PKCS#8, or PKCS#1 for RSA).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(into)]
    pub private_key_pem: Option<String>,

    /// Path to a PEM file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(into)]
    pub private_key_path: Option<PathBuf>,
}

impl KeyConfig {
    fn validate(&self) -> Result<()> {
        match (&self.private_key_pem, &self.private_key_path) {
            (Some(_), None) | (None, Some(_)) => Ok(()),
            (None, None) => Err(AuthError::invalid_configuration(format!(
                "key '{}' needs private_key_pem or private_key_path",
                self.kid
            ))),
            (Some(_), Some(_)) => Err(AuthError::invalid_configuration(format!(
                "key '{}' sets both private_key_pem and private_key_path",
                self.kid
            ))),
        }
    }

    fn load(&self, algorithm: Algorithm) -> Result<SigningKey> {
        let key = match (&self.private_key_pem, &self.private_key_path) {
            (Some(pem), _) => SigningKey::from_pem(&self.kid, algorithm, pem)?,
            (None, Some(path)) => {
                let pem = signing_key::read_pem_file(&self.kid, path)?;
                SigningKey::from_pem(&self.kid, algorithm, &pem)?
            },
            (None, None) => return Err(AuthError::invalid_configuration("key has no source")),
        };
        Ok(key)
    }
}

impl fmt::Debug for KeyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyConfig")
            .field("kid", &self.kid)
            .field("private_key_pem", &self.private_key_pem.as_ref().map(|_| "[REDACTED]"))
            .field("private_key_path", &self.private_key_path)
            .finish()
    }
}

/// Configuration for an [`Authenticator`].
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
///
/// use tokengate_authn::{AuthConfig, Authenticator, KeyConfig};
///
/// let config = AuthConfig::builder()
///     .algorithm("EdDSA")
///     .active_kid("2026-10")
///     .keys(vec![
///         KeyConfig::builder().kid("2026-10").private_key_path("/etc/tokens/2026-10.pem").build(),
///     ])
///     .issuer("https://auth.example")
///     .key_lookup_timeout(Duration::from_secs(2))
///     .build()?;
///
/// let authenticator = Authenticator::from_config(&config)?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// Algorithm name; see [`validate_algorithm`].
    #[serde(default = "default_algorithm")]
    pub(crate) algorithm: String,

    /// Key ID of the key that signs new tokens.
    #[serde(default)]
    pub(crate) active_kid: Option<String>,

    /// Private signing keys.
    #[serde(default)]
    pub(crate) keys: Vec<KeyConfig>,

    /// Expected `iss`, checked when set.
    #[serde(default)]
    pub(crate) issuer: Option<String>,

    /// Expected `aud`, checked when set.
    #[serde(default)]
    pub(crate) audience: Option<String>,

    /// Bound on a single public key lookup.
    #[serde(with = "humantime_serde", default = "default_key_lookup_timeout")]
    pub(crate) key_lookup_timeout: Duration,

    /// Remote JWK Set used for validation instead of the local keys.
    #[serde(default)]
    pub(crate) jwks_url: Option<String>,

    /// How long keys fetched from `jwks_url` are cached.
    #[serde(with = "humantime_serde", default = "default_jwks_cache_ttl")]
    pub(crate) jwks_cache_ttl: Duration,
}

#[bon::bon]
impl AuthConfig {
    /// Creates a validated configuration.
    ///
    /// # Optional Fields
    ///
    /// * `algorithm` - Algorithm name (default: `RS256`).
    /// * `active_kid` - Signing key for issuance. Required when `keys` is non-empty.
    /// * `keys` - Private signing keys (default: none).
    /// * `issuer`, `audience` - Expected claim values.
    /// * `key_lookup_timeout` - Bound on one key lookup (default: 5 seconds).
    /// * `jwks_url` - Remote JWK Set for validation.
    /// * `jwks_cache_ttl` - TTL for remote keys (default: 5 minutes).
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidConfiguration`] under the rules of
    /// [`validate`](Self::validate).
    #[builder]
    pub fn new(
        #[builder(into, default = default_algorithm())] algorithm: String,
        #[builder(into)] active_kid: Option<String>,
        #[builder(default)] keys: Vec<KeyConfig>,
        #[builder(into)] issuer: Option<String>,
        #[builder(into)] audience: Option<String>,
        #[builder(default = DEFAULT_KEY_LOOKUP_TIMEOUT)] key_lookup_timeout: Duration,
        #[builder(into)] jwks_url: Option<String>,
        #[builder(default = DEFAULT_JWKS_CACHE_TTL)] jwks_cache_ttl: Duration,
    ) -> Result<Self> {
        let config = Self {
            algorithm,
            active_kid,
            keys,
            issuer,
            audience,
            key_lookup_timeout,
            jwks_url,
            jwks_cache_ttl,
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks the configuration without loading any key material.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidConfiguration`] if:
    /// - the algorithm is forbidden or unsupported
    /// - keys are configured without `active_kid`, or `active_kid` names no configured key
    /// - a key has zero or two PEM sources
    /// - there are neither keys nor a `jwks_url`, leaving nothing to validate against
    /// - `key_lookup_timeout` is zero
    pub fn validate(&self) -> Result<()> {
        validate_algorithm(&self.algorithm)?;

        for key in &self.keys {
            key.validate()?;
        }

        match (&self.active_kid, self.keys.is_empty()) {
            (None, false) => {
                return Err(AuthError::invalid_configuration(
                    "active_kid is required when signing keys are configured",
                ));
            },
            (Some(kid), _) if !self.keys.iter().any(|key| &key.kid == kid) => {
                return Err(AuthError::invalid_configuration(format!(
                    "active_kid '{kid}' does not name a configured key"
                )));
            },
            _ => {},
        }

        if self.keys.is_empty() && self.jwks_url.is_none() {
            return Err(AuthError::invalid_configuration(
                "no verification keys: configure signing keys or jwks_url",
            ));
        }

        if self.key_lookup_timeout.is_zero() {
            return Err(AuthError::invalid_configuration("key_lookup_timeout must be non-zero"));
        }

        Ok(())
    }

    /// Returns the algorithm name.
    #[must_use]
    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    /// Returns the active key ID, if any.
    #[must_use]
    pub fn active_kid(&self) -> Option<&str> {
        self.active_kid.as_deref()
    }

    /// Returns the configured signing keys.
    #[must_use]
    pub fn keys(&self) -> &[KeyConfig] {
        &self.keys
    }

    /// Returns the expected issuer.
    #[must_use]
    pub fn issuer(&self) -> Option<&str> {
        self.issuer.as_deref()
    }

    /// Returns the expected audience.
    #[must_use]
    pub fn audience(&self) -> Option<&str> {
        self.audience.as_deref()
    }

    /// Returns the key lookup timeout.
    #[must_use]
    pub fn key_lookup_timeout(&self) -> Duration {
        self.key_lookup_timeout
    }

    /// Returns the remote JWK Set URL.
    #[must_use]
    pub fn jwks_url(&self) -> Option<&str> {
        self.jwks_url.as_deref()
    }

    /// Returns the remote key cache TTL.
    #[must_use]
    pub fn jwks_cache_ttl(&self) -> Duration {
        self.jwks_cache_ttl
    }
}

impl Authenticator {
    /// Builds an authenticator from configuration.
    ///
    /// Loads and checks every signing key. Validation resolves keys from the
    /// remote JWK Set when `jwks_url` is set, otherwise from the public
    /// halves of the configured keys.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidConfiguration`] for any invalid setting or
    /// unusable key material.
    #[tracing::instrument(skip(config), fields(algorithm = %config.algorithm))]
    pub fn from_config(config: &AuthConfig) -> Result<Self> {
        config.validate()?;
        let algorithm = validate_algorithm(&config.algorithm)?;

        let signing_keys =
            config.keys.iter().map(|key| key.load(algorithm)).collect::<Result<Vec<_>>>()?;

        let lookup: Arc<dyn PublicKeyLookup> = match &config.jwks_url {
            Some(url) => {
                let remote = JwksKeyLookup::new(url, config.key_lookup_timeout)?;
                Arc::new(CachedKeyLookup::new(Arc::new(remote), config.jwks_cache_ttl))
            },
            None => Arc::new(StaticKeyLookup::from_keys(
                signing_keys.iter().map(|key| key.public_key().clone()),
            )?),
        };

        let mut authenticator =
            Self::new(algorithm, lookup, signing_keys, config.active_kid.as_deref())?
                .with_lookup_timeout(config.key_lookup_timeout);
        if let Some(issuer) = &config.issuer {
            authenticator = authenticator.with_expected_issuer(issuer.clone());
        }
        if let Some(audience) = &config.audience {
            authenticator = authenticator.with_expected_audience(audience.clone());
        }

        tracing::info!(
            active_kid = config.active_kid.as_deref().unwrap_or("<none>"),
            keys = config.keys.len(),
            remote = config.jwks_url.is_some(),
            "Authenticator configured"
        );
        Ok(authenticator)
    }
}
