// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Content endpoints for editors.

use axum::{extract::Path, http::StatusCode, Json};
use serde::Serialize;

use crate::auth::{has_any_role, Auth, AuthError};

/// Roles allowed to publish, checked inside the handler.
pub const PUBLISHER_ROLES: [&str; 2] = ["publisher", "admin"];

#[derive(Debug, Serialize)]
pub struct ArticleListResponse {
    pub articles: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ArticleResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PublishResponse {
    pub status: String,
}

pub async fn list_articles() -> Json<ArticleListResponse> {
    Json(ArticleListResponse {
        articles: vec!["article1".to_string(), "article2".to_string()],
    })
}

pub async fn create_article() -> (StatusCode, Json<ArticleResponse>) {
    (
        StatusCode::CREATED,
        Json(ArticleResponse {
            message: "article created".to_string(),
            id: None,
        }),
    )
}

pub async fn update_article(Path(id): Path<String>) -> Json<ArticleResponse> {
    Json(ArticleResponse {
        message: "article updated".to_string(),
        id: Some(id),
    })
}

/// Publishing uses an inline role check rather than a route policy.
pub async fn publish(Auth(claims): Auth) -> Result<Json<PublishResponse>, AuthError> {
    if !has_any_role(Some(&claims), PUBLISHER_ROLES) {
        return Err(AuthError::InsufficientRole {
            required: PUBLISHER_ROLES.iter().map(|r| r.to_string()).collect(),
        });
    }
    Ok(Json(PublishResponse {
        status: "published".to_string(),
    }))
}
