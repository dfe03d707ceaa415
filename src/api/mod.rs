// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use axum::{
    middleware::from_fn_with_state,
    routing::{delete, get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    auth::{authenticate, enforce_policy, Policy},
    state::AppState,
};

pub mod admin;
pub mod content;
pub mod health;
pub mod users;

/// Routes reachable without a token. Added to the skip-list at startup.
pub const PUBLIC_ROUTES: [&str; 2] = ["/health", "/public"];

fn policy(policy: Policy) -> Arc<Policy> {
    Arc::new(policy)
}

pub fn router(state: AppState) -> Router {
    let admin_routes = Router::new()
        .route("/users", get(admin::list_users).post(admin::create_user))
        .route("/users/{id}", delete(admin::delete_user))
        .route_layer(from_fn_with_state(
            policy(Policy::require_role(["admin"])),
            enforce_policy,
        ));

    let content_routes = Router::new()
        .route(
            "/articles",
            get(content::list_articles).post(content::create_article),
        )
        .route("/articles/{id}", put(content::update_article))
        .route_layer(from_fn_with_state(
            policy(Policy::require_role(["editor", "admin"])),
            enforce_policy,
        ));

    let tenant_routes = Router::new()
        .route("/org", get(users::organization))
        .route_layer(from_fn_with_state(
            policy(Policy::require_tenant()),
            enforce_policy,
        ));

    let api_routes = Router::new()
        .route("/me", get(users::me))
        .route("/claims", get(users::claims))
        .route("/publish", post(content::publish))
        .nest("/admin", admin_routes)
        .nest("/content", content_routes)
        .merge(tenant_routes);

    Router::new()
        .route("/health", get(health::health))
        .route("/public", get(health::public))
        .nest("/api", api_routes)
        .layer(from_fn_with_state(Arc::clone(&state.gate), authenticate))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod testing {
    //! Router fixtures: a key cache that serves the test key without network.

    use std::sync::Arc;

    use chrono::Utc;
    use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
    use serde_json::{json, Value};

    use crate::auth::jwks::testing::{document, ScriptedSource, TEST_PRIVATE_PEM};
    use crate::auth::KeyCache;
    use crate::config::{AudiencePolicy, ValidationConfig};
    use crate::state::AppState;

    pub const ISSUER: &str = "https://idp.example";

    pub fn state() -> AppState {
        let config = ValidationConfig::new(ISSUER, AudiencePolicy::Require("proj1".to_string()))
            .with_skip_paths(super::PUBLIC_ROUTES);
        let keys = KeyCache::new(ScriptedSource::serving(document(&["k1"])));
        AppState::new(Arc::new(keys), config)
    }

    pub fn token(roles: &[&str], org_id: &str) -> String {
        let grants: serde_json::Map<String, Value> = roles
            .iter()
            .map(|role| (role.to_string(), json!({"org_42": "example.com"})))
            .collect();
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some("k1".to_string());
        let claims = json!({
            "sub": "user_123",
            "iss": ISSUER,
            "aud": ["proj1"],
            "exp": Utc::now().timestamp() + 3600,
            "email": "ada@example.com",
            "urn:zitadel:iam:org:id": org_id,
            "urn:zitadel:iam:user:resourceowner:primary_domain": "example.com",
            "urn:zitadel:iam:org:project:roles": grants,
        });
        let key = EncodingKey::from_rsa_pem(TEST_PRIVATE_PEM.as_bytes()).unwrap();
        encode(&header, &claims, &key).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{header::AUTHORIZATION, Method, Request, StatusCode},
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use super::testing::{state, token};
    use super::*;

    async fn call(method: Method, uri: &str, token: Option<String>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        let response = router(state())
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn public_routes_need_no_token() {
        let (status, body) = call(Method::GET, "/public", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "This is a public endpoint");
    }

    #[tokio::test]
    async fn api_requires_token() {
        let (status, body) = call(Method::GET, "/api/me", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error_code"], "missing_token");
    }

    #[tokio::test]
    async fn admin_routes_require_admin() {
        let editor = Some(token(&["editor"], "org_42"));
        let (status, _) = call(Method::GET, "/api/admin/users", editor).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let admin = Some(token(&["admin"], "org_42"));
        let (status, body) = call(Method::GET, "/api/admin/users", admin).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["users"][0], "user1");

        let (status, body) = call(
            Method::DELETE,
            "/api/admin/users/user2",
            Some(token(&["admin"], "org_42")),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], "user2");
    }

    #[tokio::test]
    async fn content_routes_accept_editor_or_admin() {
        for role in ["editor", "admin"] {
            let (status, _) = call(
                Method::GET,
                "/api/content/articles",
                Some(token(&[role], "org_42")),
            )
            .await;
            assert_eq!(status, StatusCode::OK, "role {role}");
        }

        let (status, body) = call(
            Method::POST,
            "/api/content/articles",
            Some(token(&["viewer"], "org_42")),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(
            body["error"],
            "insufficient permissions: requires one of: editor, admin"
        );
    }

    #[tokio::test]
    async fn org_route_requires_tenant() {
        let (status, body) = call(Method::GET, "/api/org", Some(token(&[], ""))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error_code"], "no_tenant_context");

        let (status, body) = call(Method::GET, "/api/org", Some(token(&[], "org_42"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["org_id"], "org_42");
    }

    #[tokio::test]
    async fn publish_checks_roles_inline() {
        let publisher = Some(token(&["publisher"], "org_42"));
        let (status, _) = call(Method::POST, "/api/publish", publisher).await;
        assert_eq!(status, StatusCode::OK);

        let editor = Some(token(&["editor"], "org_42"));
        let (status, body) = call(Method::POST, "/api/publish", editor).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(
            body["error"],
            "insufficient permissions: requires one of: publisher, admin"
        );
    }
}
