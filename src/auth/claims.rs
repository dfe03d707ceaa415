// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Verified token claims and the mapping from a raw payload.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::ValidationError;

/// Zitadel organization id claim.
pub const ZITADEL_ORG_ID_CLAIM: &str = "urn:zitadel:iam:org:id";
/// Zitadel primary domain of the user's resource owner.
pub const ZITADEL_ORG_DOMAIN_CLAIM: &str = "urn:zitadel:iam:user:resourceowner:primary_domain";
/// Zitadel project role grants.
pub const ZITADEL_ROLES_CLAIM: &str = "urn:zitadel:iam:org:project:roles";

/// Role names granted to a user.
///
/// Each role carries whatever the provider attached to the grant (for
/// Zitadel, the granting organizations). Policy only looks at the names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Roles(BTreeMap<String, Value>);

impl Roles {
    pub fn contains(&self, role: &str) -> bool {
        self.0.contains_key(role)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Opaque grant metadata for `role`.
    pub fn grant(&self, role: &str) -> Option<&Value> {
        self.0.get(role)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for Roles {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|name| (name.into(), Value::Object(Map::new())))
                .collect(),
        )
    }
}

/// Authenticated identity extracted from a verified access token.
///
/// This is the primary type used by handlers to represent the caller.
/// Optional claims default to empty values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the provider's user id.
    pub sub: String,
    pub email: String,
    /// Organization (tenant) id.
    pub org_id: String,
    pub org_domain: String,
    pub roles: Roles,
}

impl Claims {
    pub fn user_id(&self) -> &str {
        &self.sub
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn org_id(&self) -> &str {
        &self.org_id
    }

    pub fn org_domain(&self) -> &str {
        &self.org_domain
    }
}

/// Payload claim names used to build [`Claims`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimNames {
    pub email: String,
    pub org_id: String,
    pub org_domain: String,
    pub roles: String,
}

impl Default for ClaimNames {
    fn default() -> Self {
        Self {
            email: "email".to_string(),
            org_id: ZITADEL_ORG_ID_CLAIM.to_string(),
            org_domain: ZITADEL_ORG_DOMAIN_CLAIM.to_string(),
            roles: ZITADEL_ROLES_CLAIM.to_string(),
        }
    }
}

/// Maps a verified payload onto [`Claims`].
#[derive(Debug, Clone, Default)]
pub struct ClaimsExtractor {
    names: ClaimNames,
}

impl ClaimsExtractor {
    pub fn new(names: ClaimNames) -> Self {
        Self { names }
    }

    /// Build claims from a payload whose signature has already been checked.
    ///
    /// Only `sub` is required. Optional string claims that are absent or not
    /// strings become empty; a roles claim that is not an object yields no roles.
    pub fn build(&self, payload: &Map<String, Value>) -> Result<Claims, ValidationError> {
        let sub = match payload.get("sub") {
            Some(Value::String(sub)) if !sub.is_empty() => sub.clone(),
            _ => return Err(ValidationError::MalformedToken),
        };

        let roles = match payload.get(&self.names.roles) {
            Some(Value::Object(grants)) => Roles(
                grants
                    .iter()
                    .map(|(name, grant)| (name.clone(), grant.clone()))
                    .collect(),
            ),
            _ => Roles::default(),
        };

        Ok(Claims {
            sub,
            email: string_claim(payload, &self.names.email),
            org_id: string_claim(payload, &self.names.org_id),
            org_domain: string_claim(payload, &self.names.org_domain),
            roles,
        })
    }
}

fn string_claim(payload: &Map<String, Value>, name: &str) -> String {
    payload
        .get(name)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
