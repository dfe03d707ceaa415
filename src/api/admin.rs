// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Admin-only API endpoints.
//!
//! Mounted behind `Policy::require_role(["admin"])`; the handlers only log
//! which admin acted.

use axum::{extract::Path, http::StatusCode, Json};
use serde::Serialize;

use crate::auth::Auth;

#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub users: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct UserActionResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

pub async fn list_users() -> Json<UserListResponse> {
    Json(UserListResponse {
        users: vec!["user1".to_string(), "user2".to_string()],
    })
}

pub async fn create_user(Auth(admin): Auth) -> (StatusCode, Json<UserActionResponse>) {
    tracing::info!(admin = %admin.sub, "Admin created user");
    (
        StatusCode::CREATED,
        Json(UserActionResponse {
            message: "user created".to_string(),
            id: None,
        }),
    )
}

pub async fn delete_user(Auth(admin): Auth, Path(id): Path<String>) -> Json<UserActionResponse> {
    tracing::info!(admin = %admin.sub, user_id = %id, "Admin deleted user");
    Json(UserActionResponse {
        message: "user deleted".to_string(),
        id: Some(id),
    })
}
