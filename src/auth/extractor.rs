// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Access to the claims bound by the authentication middleware.
//!
//! Handlers behind [`authenticate`](super::middleware::authenticate) read the
//! verified claims without touching the token again:
//!
//! ```rust,ignore
//! async fn me(Auth(claims): Auth) -> impl IntoResponse {
//!     Json(claims)
//! }
//! ```

use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts},
    http::{request::Parts, Extensions},
};

use super::{AuthError, Claims};

/// Attach verified claims to a request.
pub fn bind_claims(extensions: &mut Extensions, claims: Claims) {
    extensions.insert(claims);
}

/// Claims bound earlier in this request, if any.
pub fn lookup_claims(extensions: &Extensions) -> Option<&Claims> {
    extensions.get::<Claims>()
}

/// Extractor for authenticated requests.
///
/// Rejects with 401 when the route was not authenticated (skip-listed, or
/// mounted outside the middleware).
///
/// # Example
///
/// ```rust,ignore
/// async fn list_articles(Auth(claims): Auth) -> Json<Vec<Article>> {
///     // claims.sub is the caller's user id
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Auth(pub Claims);

impl<S> FromRequestParts<S> for Auth
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        lookup_claims(&parts.extensions)
            .cloned()
            .map(Auth)
            .ok_or(AuthError::MissingToken)
    }
}

impl<S> OptionalFromRequestParts<S> for Auth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(lookup_claims(&parts.extensions).cloned().map(Auth))
    }
}

/// Optional authentication extractor.
///
/// `None` on public routes where the caller did not present a token.
#[derive(Debug, Clone)]
pub struct OptionalAuth(pub Option<Claims>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(OptionalAuth(lookup_claims(&parts.extensions).cloned()))
    }
}
