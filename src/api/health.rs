// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::state::AppState;

/// Health check response with individual component status.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall health status ("ok" or "degraded").
    pub status: String,
    pub checks: HealthChecks,
}

#[derive(Debug, Serialize)]
pub struct HealthChecks {
    pub service: String,
    /// "ok" when signing keys are cached and within their TTL.
    pub jwks: String,
    pub jwks_keys: usize,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Check if signing keys are available, refreshing a stale cache when the
/// refresh interval allows it.
async fn check_jwks(state: &AppState) -> bool {
    let keys = state.key_cache();
    if let Err(e) = keys.refresh_if_due().await {
        tracing::warn!(error = %e, "Health check could not refresh JWKS");
        return false;
    }
    keys.is_fresh().await
}

/// Health check endpoint handler.
///
/// Returns 200 if all checks pass, 503 if any check fails.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let jwks_ok = check_jwks(&state).await;

    let response = HealthResponse {
        status: if jwks_ok { "ok" } else { "degraded" }.to_string(),
        checks: HealthChecks {
            service: "ok".to_string(),
            jwks: if jwks_ok { "ok" } else { "unavailable" }.to_string(),
            jwks_keys: state.key_cache().key_count().await,
        },
    };

    let status = if jwks_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(response))
}

pub async fn public() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "This is a public endpoint".to_string(),
    })
}
