// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication and authorization errors.
//!
//! Token validation failures stay distinguishable internally (`ValidationError::kind`
//! is logged) but collapse to a single generic 401 at the HTTP boundary so callers
//! cannot tell which check rejected their token. Policy failures happen after
//! authentication and are reported as 403 with the policy that was not met.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Failure to fetch or decode the provider's key set.
#[derive(Debug, thiserror::Error)]
pub enum KeySourceError {
    /// Transport-level failure (connect, timeout, TLS).
    #[error("JWKS request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// Endpoint answered with a non-success status.
    #[error("JWKS endpoint returned HTTP {0}")]
    Status(u16),
    /// Response body was not a key set document.
    #[error("invalid JWKS document: {0}")]
    Decode(String),
}

/// Result of a failed key lookup.
#[derive(Debug, thiserror::Error)]
pub enum KeyCacheError {
    #[error("key {0:?} not found in JWKS")]
    NotFound(String),
    #[error("failed to refresh JWKS: {0}")]
    FetchFailed(#[source] KeySourceError),
}

/// Why a bearer token was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("token is malformed")]
    MalformedToken,
    #[error("unsupported signing algorithm {0:?}")]
    UnsupportedAlgorithm(String),
    #[error("signing key {0:?} is not published by the provider")]
    UnknownKey(String),
    #[error("signing keys are unavailable")]
    KeyUnavailable,
    #[error("token signature is invalid")]
    SignatureInvalid,
    #[error("token issuer does not match")]
    IssuerMismatch,
    #[error("token has expired")]
    Expired,
    #[error("token is not yet valid")]
    NotYetValid,
    #[error("token audience does not match")]
    AudienceMismatch,
}

impl ValidationError {
    /// Stable identifier for logs and metrics. Never sent to clients.
    pub fn kind(&self) -> &'static str {
        match self {
            ValidationError::MalformedToken => "malformed_token",
            ValidationError::UnsupportedAlgorithm(_) => "unsupported_algorithm",
            ValidationError::UnknownKey(_) => "unknown_key",
            ValidationError::KeyUnavailable => "key_unavailable",
            ValidationError::SignatureInvalid => "signature_invalid",
            ValidationError::IssuerMismatch => "issuer_mismatch",
            ValidationError::Expired => "expired",
            ValidationError::NotYetValid => "not_yet_valid",
            ValidationError::AudienceMismatch => "audience_mismatch",
        }
    }
}

impl From<KeyCacheError> for ValidationError {
    fn from(err: KeyCacheError) -> Self {
        match err {
            KeyCacheError::NotFound(kid) => ValidationError::UnknownKey(kid),
            KeyCacheError::FetchFailed(_) => ValidationError::KeyUnavailable,
        }
    }
}

/// Error returned to HTTP clients.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No bearer token in the header or query string.
    #[error("missing or invalid Authorization header")]
    MissingToken,
    /// Token was present but failed validation.
    #[error("invalid or expired token")]
    InvalidToken(#[source] ValidationError),
    /// Authenticated, but none of the required roles are granted.
    #[error("insufficient permissions: requires one of: {}", .required.join(", "))]
    InsufficientRole { required: Vec<String> },
    /// Authenticated, but the token carries no organization.
    #[error("no organization context: user must belong to an organization")]
    NoTenantContext,
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: String,
    error_code: String,
}

impl AuthError {
    /// Get the error code for this error.
    ///
    /// All validation failures share one code.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "missing_token",
            AuthError::InvalidToken(_) => "invalid_token",
            AuthError::InsufficientRole { .. } => "insufficient_role",
            AuthError::NoTenantContext => "no_tenant_context",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingToken | AuthError::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            AuthError::InsufficientRole { .. } | AuthError::NoTenantContext => {
                StatusCode::FORBIDDEN
            }
        }
    }
}

impl From<ValidationError> for AuthError {
    fn from(err: ValidationError) -> Self {
        AuthError::InvalidToken(err)
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(AuthErrorBody {
            error: self.to_string(),
            error_code: self.error_code().to_string(),
        });
        (status, body).into_response()
    }
}
