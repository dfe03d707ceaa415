// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Shared fixtures: a mock key-discovery endpoint and RSA-signed tokens.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use relational_authkit::auth::{KeyCache, TokenValidator};
use relational_authkit::config::{AudiencePolicy, ValidationConfig};
use serde_json::{json, Map, Value};
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

pub const ISSUER: &str = "https://idp.example";
pub const AUDIENCE: &str = "proj1";
pub const JWKS_PATH: &str = "/oauth/v2/keys";

pub const PRIMARY_PEM: &str = include_str!("../fixtures/rsa_private.pem");
pub const ROTATED_PEM: &str = include_str!("../fixtures/rsa_private_rotated.pem");

pub const PRIMARY_MODULUS: &str = "wkth3FZcIfM2oB3VNsljnHqYvolyUwMKgws2jydmPbID12ESvhhEc8vKQ_b0pGF-Y-9XdKNbC3oHKstHySLCTPza1rJAeFXrysmRtL6fbArwvrryJKVzDnY_rTlD-YaWouuxKj7nd44La0kLdT7EX5rpvKiZfqhGTz_1LgmIicTqWxRrI6QDC4937qvORbUEAwuK1Z9btoHLVjC4QGkZFQBq6-jKe6Vam3zZiDyd8g8E6QTGSzDL9QOGIBTycAflUXcQXQdsSoOFDZ48-WNCwa3EvrPE56cTQvJi1zF1e33IWHN1YZBTbX2CTk5Jk1yPOknzoT5lUklCrWcDnRXzBQ";
pub const ROTATED_MODULUS: &str = "reyBO7DGiOIjiJROLW27aAtSHcujERB1U6Z02IeFeINfamHwi1r1Y_wVUQmEIJwZiAXEsaQX98c7JIjtw85tUUw-BPPZlZc_psR8VCoEk9nIsCNcT0HvM651zQx8vEg5i_RzN3lcMxP0jk-kOL24_NLnmum-mhsDwXXkI8kl1oGqYDC0h0ScAzFqEaHZshBLWYCSvzxX-WJumwqIrfWxVg-rEDA2IsCBgxSl9k0onfhhre1LD_7zihAsbqp-uAB5w7wbOzrcbqb3v_MBQXG4Lpp_rMl_6Eh2CnIJ3ZsvqB6Bamo0ruYFCAJF9aIdDEmInAJAuiOxDXAOewG2BanRMQ";

/// A published RSA signature key.
pub fn jwk(kid: &str, modulus: &str) -> Value {
    json!({
        "kty": "RSA",
        "kid": kid,
        "use": "sig",
        "alg": "RS256",
        "n": modulus,
        "e": "AQAB"
    })
}

pub fn jwks_response(keys: Vec<Value>) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "keys": keys }))
}

/// Start a provider that always serves `keys`.
pub async fn jwks_server(keys: Vec<Value>) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(jwks_response(keys))
        .mount(&server)
        .await;
    server
}

pub fn jwks_url(server: &MockServer) -> String {
    format!("{}{}", server.uri(), JWKS_PATH)
}

pub async fn jwks_requests(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .map(|requests| requests.len())
        .unwrap_or(0)
}

pub fn config() -> ValidationConfig {
    ValidationConfig::new(ISSUER, AudiencePolicy::Require(AUDIENCE.to_string()))
}

pub fn validator(server: &MockServer, config: ValidationConfig) -> TokenValidator {
    let keys = Arc::new(KeyCache::from_url(jwks_url(server)));
    TokenValidator::new(keys, Arc::new(config))
}

/// Claims for `user_123` in `org_42`, valid for `exp_offset` seconds.
pub fn claims(roles: &[&str], exp_offset: i64) -> Value {
    let grants: Map<String, Value> = roles
        .iter()
        .map(|role| (role.to_string(), json!({"org_42": "example.com"})))
        .collect();
    json!({
        "sub": "user_123",
        "iss": ISSUER,
        "aud": AUDIENCE,
        "exp": Utc::now().timestamp() + exp_offset,
        "iat": Utc::now().timestamp(),
        "email": "ada@example.com",
        "urn:zitadel:iam:org:id": "org_42",
        "urn:zitadel:iam:user:resourceowner:primary_domain": "example.com",
        "urn:zitadel:iam:org:project:roles": grants,
    })
}

pub fn sign(pem: &str, kid: &str, claims: &Value) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(kid.to_string());
    let key = EncodingKey::from_rsa_pem(pem.as_bytes()).expect("fixture key");
    encode(&header, claims, &key).expect("sign token")
}
