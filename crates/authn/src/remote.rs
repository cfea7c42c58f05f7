//! Public key lookup against a remote JWK Set.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, Url};
use tokengate_keys::{KeyLookupError, PublicKey, PublicKeyLookup, jwks};

use crate::error::{AuthError, Result};

/// Default request timeout for JWK Set fetches.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Resolves key IDs by fetching a published JWK Set over HTTP.
///
/// Every call fetches the document. Wrap it in a
/// [`CachedKeyLookup`](crate::key_cache::CachedKeyLookup) for production use.
///
/// Entries in the document that cannot verify signatures are skipped; a key
/// ID that is absent, or present only as an unusable entry, is reported as
/// [`KeyLookupError::NotFound`].
#[derive(Clone, Debug)]
pub struct JwksKeyLookup {
    client: Client,
    url: Url,
}

impl JwksKeyLookup {
    /// Creates a lookup for the JWK Set published at `url`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidConfiguration`] if `url` is not an
    /// absolute `http` or `https` URL, or if the HTTP client cannot be built.
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let url = Url::parse(url).map_err(|e| {
            AuthError::invalid_configuration(format!("invalid JWKS URL '{url}': {e}"))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(AuthError::invalid_configuration(format!(
                "JWKS URL must use http or https, got '{}'",
                url.scheme()
            )));
        }
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            AuthError::invalid_configuration(format!("failed to build HTTP client: {e}"))
        })?;
        Ok(Self { client, url })
    }

    /// Returns the JWK Set URL.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    async fn fetch_document(&self) -> std::result::Result<Vec<u8>, KeyLookupError> {
        let mut response = self
            .client
            .get(self.url.clone())
            .header(http::header::ACCEPT, "application/json")
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(map_http_error)?;

        if let Some(len) = response.content_length()
            && len > jwks::MAX_JWKS_BYTES as u64
        {
            return Err(KeyLookupError::unavailable(format!(
                "JWK Set response is {len} bytes, limit is {}",
                jwks::MAX_JWKS_BYTES
            )));
        }

        // Content-Length is absent on chunked responses, so the cap is also
        // enforced while reading.
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(map_http_error)? {
            if body.len() + chunk.len() > jwks::MAX_JWKS_BYTES {
                return Err(KeyLookupError::unavailable(format!(
                    "JWK Set response exceeds {} bytes",
                    jwks::MAX_JWKS_BYTES
                )));
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}

#[async_trait]
impl PublicKeyLookup for JwksKeyLookup {
    #[tracing::instrument(skip(self), fields(url = %self.url))]
    async fn public_key_for(&self, kid: &str) -> std::result::Result<Arc<PublicKey>, KeyLookupError> {
        let document = self.fetch_document().await?;
        let set = jwks::parse_jwks(&document)
            .map_err(|e| KeyLookupError::unavailable_with_source("invalid JWK Set document", e))?;

        let key = jwks::public_keys_from_jwks(&set)
            .into_iter()
            .find(|key| key.kid().as_str() == kid)
            .ok_or_else(|| KeyLookupError::not_found(kid))?;

        tracing::debug!(kid, keys = set.keys.len(), "Resolved key from remote JWK Set");
        Ok(Arc::new(key))
    }
}

fn map_http_error(err: reqwest::Error) -> KeyLookupError {
    if err.is_timeout() {
        return KeyLookupError::timeout();
    }
    let message = match err.status() {
        Some(status) => format!("JWK Set endpoint returned {status}"),
        None => "JWK Set request failed".to_owned(),
    };
    KeyLookupError::unavailable_with_source(message, err)
}
