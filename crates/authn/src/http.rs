//! Axum integration.
//!
//! [`require_role`] runs a [`RequireRole`] guard as axum middleware and
//! stores the validated claims in the request extensions as
//! `Arc<Claims>`. Handlers read them with the [`Authenticated`] extractor.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use axum::{Router, middleware::from_fn_with_state, routing::get};
//! use tokengate_authn::{
//!     Authenticator, Role,
//!     http::{Authenticated, require_role},
//!     middleware::RequireRole,
//! };
//!
//! async fn whoami(Authenticated(claims): Authenticated) -> String {
//!     claims.sub.clone()
//! }
//!
//! fn router(auth: Arc<Authenticator>) -> Router {
//!     let admins = RequireRole::new(auth, [Role::Admin, Role::Owner]);
//!     Router::new().route("/whoami", get(whoami)).layer(from_fn_with_state(admins, require_role))
//! }
//! ```

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderValue, StatusCode, header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{
    claims::Claims,
    error::AccessError,
    middleware::{RequireRole, bearer_token},
};

const WWW_AUTHENTICATE_BEARER: &str = "Bearer error=\"invalid_token\"";

/// Axum middleware enforcing `guard` on every request.
///
/// On success the claims are inserted into the request extensions and the
/// request continues. On failure the [`AccessError`] is rendered as the
/// response (401 or 403).
pub async fn require_role(
    State(guard): State<RequireRole>,
    mut request: Request,
    next: Next,
) -> Response {
    let credential = bearer_token(request.headers()).map(str::to_owned);
    match guard.authorize(credential.as_deref()).await {
        Ok(claims) => {
            request.extensions_mut().insert(claims);
            next.run(request).await
        },
        Err(err) => err.into_response(),
    }
}

impl IntoResponse for AccessError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut response = (status, self.to_string()).into_response();
        if self.is_authentication_failure() {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static(WWW_AUTHENTICATE_BEARER));
        }
        response
    }
}

/// Extracts the claims stored by [`require_role`].
///
/// Rejects with [`GuardNotInstalled`] when no guard ran for the route.
#[derive(Clone, Debug)]
pub struct Authenticated(pub Arc<Claims>);

/// Rejection for [`Authenticated`] on a route without a [`require_role`]
/// layer. This is a server wiring error, so it renders as 500.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GuardNotInstalled;

impl IntoResponse for GuardNotInstalled {
    fn into_response(self) -> Response {
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    }
}

impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = GuardNotInstalled;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<Arc<Claims>>() {
            Some(claims) => Ok(Authenticated(Arc::clone(claims))),
            None => {
                tracing::error!(
                    path = %parts.uri.path(),
                    "Authenticated extractor used on a route without a require_role layer"
                );
                Err(GuardNotInstalled)
            },
        }
    }
}
