//! Role-based authorization in front of an operation.
//!
//! A request moves through two checks, stopping at the first failure:
//!
//! ```text
//! credential? ── no ──▶ MissingCredential
//!     │
//! validate_token ── err ──▶ Unauthenticated(reason)
//!     │
//! any required role? ── no ──▶ Forbidden
//!     │
//! operation(request, context + claims)
//! ```
//!
//! [`RequireRole`] is transport-agnostic: anything that implements
//! [`CredentialSource`] can be guarded. The axum adapter lives in
//! [`crate::http`].

use std::{fmt, future::Future, sync::Arc};

use async_trait::async_trait;
use http::{HeaderMap, Request, header::AUTHORIZATION};

use crate::{
    authenticator::Authenticator, claims::Claims, error::AccessError, roles::Role,
};

/// Extracts the token from an `Authorization: Bearer <token>` header.
///
/// The scheme is matched case-insensitively. Returns `None` when the header
/// is absent, not valid ASCII, uses another scheme, or carries an empty
/// token.
///
/// # Examples
///
/// ```
/// use http::HeaderMap;
/// use tokengate_authn::middleware::bearer_token;
///
/// let mut headers = HeaderMap::new();
/// headers.insert("authorization", "Bearer eyJhbGciOi.e30.c2ln".parse().unwrap());
/// assert_eq!(bearer_token(&headers), Some("eyJhbGciOi.e30.c2ln"));
/// ```
#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// A request that may carry a credential.
pub trait CredentialSource {
    /// Returns the raw token, if the request carries one.
    fn credential(&self) -> Option<&str>;
}

impl CredentialSource for HeaderMap {
    fn credential(&self) -> Option<&str> {
        bearer_token(self)
    }
}

impl<B> CredentialSource for Request<B> {
    fn credential(&self) -> Option<&str> {
        bearer_token(self.headers())
    }
}

/// Request-scoped values handed to a guarded operation.
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    claims: Option<Arc<Claims>>,
}

impl RequestContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of this context carrying `claims`.
    #[must_use]
    pub fn with_claims(mut self, claims: Arc<Claims>) -> Self {
        self.claims = Some(claims);
        self
    }

    /// Returns the authenticated claims, if a guard ran.
    #[must_use]
    pub fn claims(&self) -> Option<&Claims> {
        self.claims.as_deref()
    }

    /// Returns the shared claims handle, if a guard ran.
    #[must_use]
    pub fn claims_arc(&self) -> Option<&Arc<Claims>> {
        self.claims.as_ref()
    }
}

/// An operation that takes a request and its context.
#[async_trait]
pub trait Operation<Req: Send + 'static>: Send + Sync {
    /// The operation's result.
    type Output: Send;

    /// Runs the operation.
    async fn call(&self, request: Req, context: RequestContext) -> Self::Output;
}

/// Adapts an async closure into an [`Operation`].
#[derive(Clone)]
pub struct FnOperation<F>(F);

/// Wraps `f` as an [`Operation`].
pub fn operation<F>(f: F) -> FnOperation<F> {
    FnOperation(f)
}

#[async_trait]
impl<Req, F, Fut, T> Operation<Req> for FnOperation<F>
where
    Req: Send + 'static,
    F: Fn(Req, RequestContext) -> Fut + Send + Sync,
    Fut: Future<Output = T> + Send,
    T: Send,
{
    type Output = T;

    async fn call(&self, request: Req, context: RequestContext) -> T {
        (self.0)(request, context).await
    }
}

impl<F> fmt::Debug for FnOperation<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnOperation").finish_non_exhaustive()
    }
}

/// Requires an authenticated caller holding at least one of a set of roles.
///
/// Role matching is "any of": the caller passes if any role in its claims is
/// among the required roles. An empty required set admits no one.
///
/// # Examples
///
/// ```
/// use std::{sync::Arc, time::Duration};
///
/// use tokengate_authn::{
///     Authenticator, Claims, Role,
///     middleware::{RequestContext, RequireRole, operation},
/// };
/// use tokengate_keys::{Algorithm, SigningKey, StaticKeyLookup};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let key = SigningKey::generate_ed25519("k1")?;
/// let lookup = StaticKeyLookup::new().with_key(key.public_key().clone())?;
/// let auth = Arc::new(Authenticator::new(Algorithm::EdDSA, Arc::new(lookup), [key], Some("k1"))?);
///
/// let token = auth.issue_token(&Claims::new("user-1", [Role::Admin], auth.now(), Duration::from_secs(60)))?;
///
/// let guarded = RequireRole::new(auth, [Role::Admin, Role::Owner]).wrap(operation(
///     |_request: http::Request<()>, context: RequestContext| async move {
///         context.claims().map(|claims| claims.sub.clone())
///     },
/// ));
///
/// let request = http::Request::builder()
///     .header("authorization", format!("Bearer {token}"))
///     .body(())?;
/// let subject = guarded.call(request, RequestContext::new()).await?;
/// assert_eq!(subject.as_deref(), Some("user-1"));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RequireRole {
    authenticator: Arc<Authenticator>,
    roles: Arc<[Role]>,
}

impl RequireRole {
    /// Creates a guard admitting callers with any of `roles`.
    pub fn new(authenticator: Arc<Authenticator>, roles: impl IntoIterator<Item = Role>) -> Self {
        Self { authenticator, roles: roles.into_iter().collect() }
    }

    /// Returns the required roles.
    #[must_use]
    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    /// Returns the authenticator used to validate credentials.
    #[must_use]
    pub fn authenticator(&self) -> &Arc<Authenticator> {
        &self.authenticator
    }

    /// Authenticates `credential` and checks its roles.
    ///
    /// # Errors
    ///
    /// - [`AccessError::MissingCredential`] if `credential` is `None`
    /// - [`AccessError::Unauthenticated`] if validation fails, carrying the reason
    /// - [`AccessError::Forbidden`] if no required role is held
    #[tracing::instrument(skip_all, fields(required = ?self.roles))]
    pub async fn authorize(&self, credential: Option<&str>) -> Result<Arc<Claims>, AccessError> {
        let Some(token) = credential else {
            tracing::warn!("Request carries no credential");
            return Err(AccessError::MissingCredential);
        };

        let claims = match self.authenticator.validate_token(token).await {
            Ok(claims) => claims,
            Err(err) => {
                tracing::warn!(reason = %err, kind = err.kind(), "Authentication failed");
                return Err(AccessError::Unauthenticated(err));
            },
        };

        if !claims.has_any_role(&self.roles) {
            tracing::warn!(
                audit.action = "authorize",
                audit.subject = %claims.sub,
                audit.result = "forbidden",
                "audit_event"
            );
            return Err(AccessError::Forbidden);
        }

        tracing::debug!(
            audit.action = "authorize",
            audit.subject = %claims.sub,
            audit.result = "allowed",
            "audit_event"
        );
        Ok(Arc::new(claims))
    }

    /// Wraps `operation` so it only runs for authorized callers.
    pub fn wrap<O>(&self, operation: O) -> Guarded<O> {
        Guarded { guard: self.clone(), operation }
    }
}

impl fmt::Debug for RequireRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequireRole").field("roles", &self.roles).finish_non_exhaustive()
    }
}

/// An operation behind a [`RequireRole`] guard.
#[derive(Clone, Debug)]
pub struct Guarded<O> {
    guard: RequireRole,
    operation: O,
}

impl<O> Guarded<O> {
    /// Authorizes `request`, then runs the operation with the validated
    /// claims added to `context`.
    ///
    /// # Errors
    ///
    /// Returns the [`AccessError`] from [`RequireRole::authorize`]; the
    /// operation does not run in that case.
    pub async fn call<Req>(
        &self,
        request: Req,
        context: RequestContext,
    ) -> Result<O::Output, AccessError>
    where
        Req: CredentialSource + Send + 'static,
        O: Operation<Req>,
    {
        let credential = request.credential().map(str::to_owned);
        let claims = self.guard.authorize(credential.as_deref()).await?;
        Ok(self.operation.call(request, context.with_claims(claims)).await)
    }

    /// Returns the guard.
    #[must_use]
    pub fn guard(&self) -> &RequireRole {
        &self.guard
    }
}
