// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Relational Authkit - OIDC bearer-token authentication for Axum services
//!
//! Verifies access tokens issued by an external OpenID-Connect provider
//! against its published signing keys, then enforces role and tenant policy
//! before requests reach application handlers.
//!
//! ## Modules
//!
//! - `auth` - JWKS cache, token validation, claims, policy, middleware
//! - `config` - Environment-driven settings
//! - `api` - Demo HTTP handlers (Axum)
//! - `state` - Shared application state for the demo service

pub mod api;
pub mod auth;
pub mod config;
pub mod state;
