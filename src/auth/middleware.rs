// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication and policy middleware for Axum.
//!
//! [`authenticate`] runs for every route of the router it is layered on:
//! skip-listed routes pass straight through, every other request must carry a
//! valid bearer token and gets its [`Claims`] bound into the request
//! extensions. [`enforce_policy`] is layered per route group after that.
//!
//! ```rust,ignore
//! let gate = Arc::new(RequestGate::new(validator));
//! let admin = Router::new()
//!     .route("/users", get(list_users))
//!     .route_layer(from_fn_with_state(
//!         Arc::new(Policy::require_role(["admin"])),
//!         enforce_policy,
//!     ));
//!
//! let app = Router::new()
//!     .nest("/api/admin", admin)
//!     .layer(from_fn_with_state(gate, authenticate));
//! ```

use std::sync::Arc;

use axum::{
    extract::{MatchedPath, Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::extractor::{bind_claims, lookup_claims};
use super::jwks::KeyCache;
use super::roles::{Decision, Policy};
use super::validator::TokenValidator;
use super::{AuthError, Claims};
use crate::config::ValidationConfig;

/// Query parameter checked when no bearer header is present.
pub const TOKEN_QUERY_PARAM: &str = "token";

const BEARER_PREFIX: &str = "Bearer ";

/// Pull the raw token out of a request.
///
/// `Authorization: Bearer <token>` wins; otherwise the `token` query
/// parameter is used (browsers cannot set headers on websocket upgrades).
pub fn extract_token(headers: &HeaderMap, query: Option<&str>) -> Option<String> {
    let from_header = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix(BEARER_PREFIX))
        .filter(|token| !token.is_empty());
    if let Some(token) = from_header {
        return Some(token.to_string());
    }

    query.and_then(|query| {
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(name, value)| name == TOKEN_QUERY_PARAM && !value.is_empty())
            .map(|(_, value)| value.into_owned())
    })
}

/// What the gate decided for one request.
#[derive(Debug, Clone, PartialEq)]
pub enum GateOutcome {
    /// Route is skip-listed; no token was inspected.
    Skipped,
    Authenticated(Claims),
}

/// Per-request authentication: skip-list, token extraction, validation.
#[derive(Debug, Clone)]
pub struct RequestGate {
    validator: TokenValidator,
}

impl RequestGate {
    pub fn new(validator: TokenValidator) -> Self {
        Self { validator }
    }

    pub fn from_parts(keys: Arc<KeyCache>, config: Arc<ValidationConfig>) -> Self {
        Self::new(TokenValidator::new(keys, config))
    }

    pub fn validator(&self) -> &TokenValidator {
        &self.validator
    }

    pub fn config(&self) -> &ValidationConfig {
        self.validator.config()
    }

    /// Decide whether a request to `route` may proceed.
    ///
    /// # Errors
    ///
    /// `MissingToken` when no token is present, `InvalidToken` when
    /// validation fails.
    pub async fn check(
        &self,
        route: &str,
        headers: &HeaderMap,
        query: Option<&str>,
    ) -> Result<GateOutcome, AuthError> {
        if self.config().is_skipped(route) {
            tracing::trace!(target: "authkit.gate", route, "Route is skip-listed");
            return Ok(GateOutcome::Skipped);
        }

        let Some(token) = extract_token(headers, query) else {
            tracing::debug!(target: "authkit.gate", route, "Request without bearer token");
            return Err(AuthError::MissingToken);
        };

        match self.validator.validate(&token).await {
            Ok(claims) => Ok(GateOutcome::Authenticated(claims)),
            Err(err) => {
                tracing::warn!(
                    target: "authkit.gate",
                    route,
                    kind = err.kind(),
                    error = %err,
                    "Rejected bearer token"
                );
                Err(AuthError::InvalidToken(err))
            }
        }
    }
}

/// Authentication middleware function.
pub async fn authenticate(
    State(gate): State<Arc<RequestGate>>,
    mut request: Request,
    next: Next,
) -> Response {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let outcome = gate
        .check(&route, request.headers(), request.uri().query())
        .await;

    match outcome {
        Ok(GateOutcome::Skipped) => next.run(request).await,
        Ok(GateOutcome::Authenticated(claims)) => {
            bind_claims(request.extensions_mut(), claims);
            next.run(request).await
        }
        Err(err) => err.into_response(),
    }
}

/// Route-level policy middleware. Must run after [`authenticate`].
pub async fn enforce_policy(
    State(policy): State<Arc<Policy>>,
    request: Request,
    next: Next,
) -> Response {
    let decision = policy.evaluate(lookup_claims(request.extensions()));
    match decision {
        Decision::Allow => next.run(request).await,
        Decision::Deny(reason) => AuthError::from(reason).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::{
        body::{to_bytes, Body},
        http::{HeaderValue, StatusCode},
        middleware::from_fn_with_state,
        routing::get,
        Json, Router,
    };
    use chrono::Utc;
    use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::auth::extractor::Auth;
    use crate::auth::jwks::testing::{document, ScriptedSource, TEST_PRIVATE_PEM};
    use crate::config::AudiencePolicy;

    const ISSUER: &str = "https://idp.example";

    fn token(roles: Value, org_id: &str) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some("k1".to_string());
        let claims = json!({
            "sub": "user_123",
            "iss": ISSUER,
            "aud": "proj1",
            "exp": Utc::now().timestamp() + 3600,
            "urn:zitadel:iam:org:id": org_id,
            "urn:zitadel:iam:org:project:roles": roles,
        });
        let key = EncodingKey::from_rsa_pem(TEST_PRIVATE_PEM.as_bytes()).unwrap();
        encode(&header, &claims, &key).unwrap()
    }

    fn gate() -> (Arc<RequestGate>, Arc<AtomicUsize>) {
        let source = ScriptedSource::serving(document(&["k1"]));
        let fetches = Arc::clone(&source.calls);
        let config = ValidationConfig::new(ISSUER, AudiencePolicy::Require("proj1".to_string()))
            .with_skip_paths(["/health", "/items/{id}"]);
        let gate = RequestGate::from_parts(Arc::new(KeyCache::new(source)), Arc::new(config));
        (Arc::new(gate), fetches)
    }

    async fn me(Auth(claims): Auth) -> Json<Claims> {
        Json(claims)
    }

    fn app(gate: Arc<RequestGate>) -> Router {
        let admin = Router::new()
            .route("/users", get(|| async { "users" }))
            .route_layer(from_fn_with_state(
                Arc::new(Policy::require_role(["admin"])),
                enforce_policy,
            ));

        Router::new()
            .route("/health", get(|| async { "ok" }))
            .route("/items/{id}", get(|| async { "item" }))
            .route("/me", get(me))
            .nest("/admin", admin)
            .layer(from_fn_with_state(gate, authenticate))
    }

    async fn send(app: Router, uri: &str, bearer: Option<&str>) -> (StatusCode, Value) {
        let mut request = axum::http::Request::builder().uri(uri).body(Body::empty()).unwrap();
        if let Some(token) = bearer {
            request.headers_mut().insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
            );
        }
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    #[test]
    fn extract_token_prefers_header() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        assert_eq!(
            extract_token(&headers, Some("token=from-query")),
            Some("from-header".to_string())
        );
    }

    #[test]
    fn extract_token_falls_back_to_query() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        assert_eq!(
            extract_token(&headers, Some("room=1&token=a%2Eb.c")),
            Some("a.b.c".to_string())
        );
        assert_eq!(extract_token(&HeaderMap::new(), Some("room=1")), None);
        assert_eq!(extract_token(&HeaderMap::new(), Some("token=")), None);
        assert_eq!(extract_token(&HeaderMap::new(), None), None);
    }

    #[tokio::test]
    async fn skip_listed_route_needs_no_token() {
        let (gate, fetches) = gate();

        let (status, _) = send(app(Arc::clone(&gate)), "/health", None).await;
        assert_eq!(status, StatusCode::OK);

        // A garbage token on a skipped route is never looked at.
        let (status, _) = send(app(Arc::clone(&gate)), "/items/7", Some("garbage")).await;
        assert_eq!(status, StatusCode::OK);

        assert_eq!(fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn skip_list_matches_exactly() {
        let (gate, _) = gate();
        let outcome = gate.check("/health/deep", &HeaderMap::new(), None).await;
        assert!(matches!(outcome, Err(AuthError::MissingToken)));
    }

    #[tokio::test]
    async fn missing_token_is_401() {
        let (gate, _) = gate();
        let (status, body) = send(app(gate), "/me", None).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "missing or invalid Authorization header");
    }

    #[tokio::test]
    async fn invalid_token_is_generic_401() {
        let (gate, _) = gate();
        let (status, body) = send(app(gate), "/me", Some("not-a-jwt")).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "invalid or expired token");
        assert_eq!(body["error_code"], "invalid_token");
    }

    #[tokio::test]
    async fn valid_token_binds_claims() {
        let (gate, _) = gate();
        let bearer = token(json!({"viewer": {}}), "org_42");
        let (status, body) = send(app(gate), "/me", Some(&bearer)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["sub"], "user_123");
        assert_eq!(body["org_id"], "org_42");
    }

    #[tokio::test]
    async fn query_token_is_accepted() {
        let (gate, _) = gate();
        let uri = format!("/me?token={}", token(json!({}), "org_42"));
        let (status, body) = send(app(gate), &uri, None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["sub"], "user_123");
    }

    #[tokio::test]
    async fn policy_denies_with_403() {
        let (gate, _) = gate();
        let bearer = token(json!({}), "org_42");
        let (status, body) = send(app(gate), "/admin/users", Some(&bearer)).await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(
            body["error"],
            "insufficient permissions: requires one of: admin"
        );
        assert_eq!(body["error_code"], "insufficient_role");
    }

    #[tokio::test]
    async fn policy_allows_admin() {
        let (gate, _) = gate();
        let token = token(json!({"admin": {"org_42": "example.com"}}), "org_42");
        let request = axum::http::Request::builder()
            .uri("/admin/users")
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();

        let response = app(gate).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn policy_without_authentication_is_401() {
        let app = Router::new()
            .route("/org", get(|| async { "org" }))
            .route_layer(from_fn_with_state(
                Arc::new(Policy::require_tenant()),
                enforce_policy,
            ));
        let (status, body) = send(app, "/org", None).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error_code"], "missing_token");
    }
}
