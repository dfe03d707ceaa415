// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Verifies OpenID-Connect access tokens issued by an external identity
//! provider (Zitadel claim names by default) and enforces role and tenant
//! policy on top of the verified claims.
//!
//! ## Auth Flow
//!
//! 1. The client sends `Authorization: Bearer <JWT>` (or `?token=<JWT>` on
//!    websocket upgrades)
//! 2. [`authenticate`] middleware:
//!    - Skips routes on the configured skip-list
//!    - Resolves the signing key from the JWKS cache
//!    - Verifies algorithm, signature, issuer, expiry, audience
//!    - Binds [`Claims`] into the request extensions
//! 3. Handlers read the claims with [`Auth`] / [`OptionalAuth`] and apply
//!    [`Policy`] checks or the [`has_role`] / [`has_any_role`] helpers
//!
//! ## Security
//!
//! - Only RS256/RS384/RS512 are accepted; `none` and HMAC tokens are refused
//!   before any key lookup
//! - JWKS is fetched over HTTPS and cached with a TTL
//! - Every validation failure is reported to the client as the same 401

pub mod claims;
pub mod error;
pub mod extractor;
pub mod jwks;
pub mod middleware;
pub mod roles;
pub mod validator;

pub use claims::{ClaimNames, Claims, ClaimsExtractor, Roles};
pub use error::{AuthError, KeyCacheError, KeySourceError, ValidationError};
pub use extractor::{bind_claims, lookup_claims, Auth, OptionalAuth};
pub use jwks::{HttpKeySource, KeyCache, SigningKey, SigningKeySource};
pub use middleware::{authenticate, enforce_policy, extract_token, GateOutcome, RequestGate};
pub use roles::{has_any_role, has_role, Decision, DenyReason, Policy};
pub use validator::TokenValidator;
