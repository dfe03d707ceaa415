// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Role and tenant authorization.
//!
//! Every check takes `Option<&Claims>`; `None` means the request was never
//! authenticated and is always denied.
//!
//! ```rust,ignore
//! let policy = Policy::require_role(["editor", "admin"]);
//! match policy.evaluate(lookup_claims(request.extensions())) {
//!     Decision::Allow => { /* continue */ }
//!     Decision::Deny(reason) => return AuthError::from(reason).into_response(),
//! }
//! ```

use std::fmt;

use super::claims::Claims;
use super::error::AuthError;

/// True iff `role` is one of the granted role names.
pub fn has_role(claims: Option<&Claims>, role: &str) -> bool {
    claims.is_some_and(|claims| claims.roles.contains(role))
}

/// True iff at least one of `roles` is granted.
pub fn has_any_role<I, S>(claims: Option<&Claims>, roles: I) -> bool
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let Some(claims) = claims else {
        return false;
    };
    roles
        .into_iter()
        .any(|role| claims.roles.contains(role.as_ref()))
}

/// Why a policy denied the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
    Unauthenticated,
    InsufficientRole { required: Vec<String> },
    NoTenantContext,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenyReason::Unauthenticated => write!(f, "authentication required"),
            DenyReason::InsufficientRole { required } => {
                write!(f, "requires one of: {}", required.join(", "))
            }
            DenyReason::NoTenantContext => write!(f, "requires an organization context"),
        }
    }
}

impl From<DenyReason> for AuthError {
    fn from(reason: DenyReason) -> Self {
        match reason {
            DenyReason::Unauthenticated => AuthError::MissingToken,
            DenyReason::InsufficientRole { required } => AuthError::InsufficientRole { required },
            DenyReason::NoTenantContext => AuthError::NoTenantContext,
        }
    }
}

/// Outcome of [`Policy::evaluate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// A route-level authorization rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Policy {
    /// Allow when any of the listed roles is granted.
    AnyRole(Vec<String>),
    /// Allow when the caller belongs to an organization.
    Tenant,
}

impl Policy {
    pub fn require_role<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Policy::AnyRole(roles.into_iter().map(Into::into).collect())
    }

    pub fn require_tenant() -> Self {
        Policy::Tenant
    }

    pub fn evaluate(&self, claims: Option<&Claims>) -> Decision {
        let Some(claims) = claims else {
            return Decision::Deny(DenyReason::Unauthenticated);
        };

        match self {
            Policy::AnyRole(required) => {
                if has_any_role(Some(claims), required) {
                    Decision::Allow
                } else {
                    tracing::info!(
                        target: "authkit.policy",
                        sub = %claims.sub,
                        required = %required.join(","),
                        "Role check denied"
                    );
                    Decision::Deny(DenyReason::InsufficientRole {
                        required: required.clone(),
                    })
                }
            }
            Policy::Tenant => {
                if claims.org_id.is_empty() {
                    tracing::info!(
                        target: "authkit.policy",
                        sub = %claims.sub,
                        "Tenant check denied"
                    );
                    Decision::Deny(DenyReason::NoTenantContext)
                } else {
                    Decision::Allow
                }
            }
        }
    }
}
