// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Identity endpoints for the authenticated caller.

use axum::Json;
use serde::Serialize;

use crate::auth::{Auth, Claims};

/// Response for GET /api/me
#[derive(Debug, Serialize, PartialEq)]
pub struct MeResponse {
    pub user_id: String,
    pub email: String,
    pub org_id: String,
}

impl From<&Claims> for MeResponse {
    fn from(claims: &Claims) -> Self {
        Self {
            user_id: claims.user_id().to_string(),
            email: claims.email().to_string(),
            org_id: claims.org_id().to_string(),
        }
    }
}

/// Response for GET /api/org
#[derive(Debug, Serialize, PartialEq)]
pub struct OrganizationResponse {
    pub org_id: String,
    pub org_domain: String,
    pub roles: Vec<String>,
}

pub async fn me(Auth(claims): Auth) -> Json<MeResponse> {
    Json(MeResponse::from(&claims))
}

/// The full verified claim set.
pub async fn claims(Auth(claims): Auth) -> Json<Claims> {
    Json(claims)
}

/// Tenant-scoped view; mounted behind `Policy::require_tenant`.
pub async fn organization(Auth(claims): Auth) -> Json<OrganizationResponse> {
    Json(OrganizationResponse {
        org_id: claims.org_id().to_string(),
        org_domain: claims.org_domain().to_string(),
        roles: claims.roles.names().map(str::to_string).collect(),
    })
}
