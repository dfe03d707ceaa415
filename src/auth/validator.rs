// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bearer token verification.
//!
//! ## Security Checks (in order)
//!
//! 1. Size and structure: three base64url segments, JSON header and object payload
//! 2. Algorithm allow-list (RSA signatures only), before any key lookup
//! 3. Key id present in the header
//! 4. Key resolved from the JWKS cache
//! 5. Signature
//! 6. Issuer, exact string match
//! 7. `exp` strictly in the future, `nbf` not in the future
//! 8. Audience, when required by configuration
//!
//! The first failing check decides the error.

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, Validation};
use serde::de::IgnoredAny;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::instrument;

use super::claims::{Claims, ClaimsExtractor};
use super::error::ValidationError;
use super::jwks::{KeyCache, SigningKey};
use crate::config::{AudiencePolicy, ValidationConfig};

/// Tokens larger than this are rejected before decoding.
pub const MAX_TOKEN_SIZE_BYTES: usize = 8192;

/// Accepted `alg` header values.
pub const ALLOWED_ALGORITHMS: [&str; 3] = ["RS256", "RS384", "RS512"];

fn allowed_algorithm(alg: &str) -> Option<Algorithm> {
    if !ALLOWED_ALGORITHMS.contains(&alg) {
        return None;
    }
    alg.parse().ok()
}

#[derive(Debug, Deserialize)]
struct TokenHeader {
    alg: String,
    #[serde(default)]
    kid: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    fn contains(&self, expected: &str) -> bool {
        match self {
            Audience::One(aud) => aud == expected,
            Audience::Many(auds) => auds.iter().any(|aud| aud == expected),
        }
    }
}

/// Registered claims checked by the validator.
///
/// NumericDate values may carry a fractional part; they are floored to whole
/// seconds.
#[derive(Debug, Deserialize)]
struct RegisteredClaims {
    #[serde(default)]
    iss: Option<String>,
    #[serde(default)]
    exp: Option<f64>,
    #[serde(default)]
    nbf: Option<f64>,
    #[serde(default)]
    aud: Option<Audience>,
}

impl RegisteredClaims {
    /// Only called once the signature has been verified.
    fn from_payload(payload: &[u8]) -> Result<Self, ValidationError> {
        serde_json::from_slice(payload).map_err(|e| {
            tracing::debug!(
                target: "authkit.validator",
                error = %e,
                "Registered claim has the wrong type"
            );
            ValidationError::MalformedToken
        })
    }

    fn expires_at(&self) -> Option<i64> {
        self.exp.map(numeric_date)
    }

    fn not_before(&self) -> Option<i64> {
        self.nbf.map(numeric_date)
    }
}

fn numeric_date(value: f64) -> i64 {
    value.floor() as i64
}

/// A token split into its parts; nothing in here is trusted yet.
struct UnverifiedToken {
    header: TokenHeader,
    payload: Map<String, Value>,
    payload_json: Vec<u8>,
}

fn decode_segment(segment: &str) -> Result<Vec<u8>, ValidationError> {
    URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| ValidationError::MalformedToken)
}

fn decode_unverified(token: &str) -> Result<UnverifiedToken, ValidationError> {
    if token.len() > MAX_TOKEN_SIZE_BYTES {
        return Err(ValidationError::MalformedToken);
    }

    let mut segments = token.split('.');
    let (Some(header), Some(payload), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(ValidationError::MalformedToken);
    };

    let header: TokenHeader = serde_json::from_slice(&decode_segment(header)?)
        .map_err(|_| ValidationError::MalformedToken)?;
    let payload_json = decode_segment(payload)?;
    let payload: Map<String, Value> =
        serde_json::from_slice(&payload_json).map_err(|_| ValidationError::MalformedToken)?;

    Ok(UnverifiedToken {
        header,
        payload,
        payload_json,
    })
}

fn verify_signature(token: &str, key: &SigningKey, alg: Algorithm) -> Result<(), ValidationError> {
    if let Some(declared) = key.algorithm() {
        if allowed_algorithm(declared) != Some(alg) {
            tracing::warn!(
                target: "authkit.validator",
                kid = %key.kid(),
                declared,
                "Token algorithm does not match the key's declared algorithm"
            );
            return Err(ValidationError::SignatureInvalid);
        }
    }

    // Signature only; registered claims are checked afterwards in a fixed order.
    let mut validation = Validation::new(alg);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    decode::<IgnoredAny>(token, key.decoding_key(), &validation)
        .map(|_| ())
        .map_err(|e| match e.kind() {
            ErrorKind::InvalidSignature => ValidationError::SignatureInvalid,
            _ => {
                tracing::debug!(
                    target: "authkit.validator",
                    kid = %key.kid(),
                    error = %e,
                    "Signature check did not complete"
                );
                ValidationError::MalformedToken
            }
        })
}

/// Verifies access tokens against the provider's published keys.
#[derive(Debug, Clone)]
pub struct TokenValidator {
    keys: Arc<KeyCache>,
    config: Arc<ValidationConfig>,
    extractor: ClaimsExtractor,
}

impl TokenValidator {
    pub fn new(keys: Arc<KeyCache>, config: Arc<ValidationConfig>) -> Self {
        let extractor = ClaimsExtractor::new(config.claim_names.clone());
        Self {
            keys,
            config,
            extractor,
        }
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    pub fn key_cache(&self) -> &Arc<KeyCache> {
        &self.keys
    }

    /// Validate a raw token and return its claims.
    ///
    /// Usable outside the middleware, e.g. to re-authenticate a long-lived
    /// websocket.
    ///
    /// # Errors
    ///
    /// The [`ValidationError`] of the first failed check.
    pub async fn validate(&self, token: &str) -> Result<Claims, ValidationError> {
        self.validate_at(token, Utc::now().timestamp()).await
    }

    /// Validate as of `now` (Unix seconds).
    #[instrument(skip_all)]
    pub async fn validate_at(&self, token: &str, now: i64) -> Result<Claims, ValidationError> {
        let unverified = decode_unverified(token)?;

        let alg = allowed_algorithm(&unverified.header.alg)
            .ok_or_else(|| ValidationError::UnsupportedAlgorithm(unverified.header.alg.clone()))?;

        let kid = unverified
            .header
            .kid
            .as_deref()
            .filter(|kid| !kid.is_empty())
            .ok_or(ValidationError::MalformedToken)?;

        let key = self.keys.get_key(kid).await?;

        verify_signature(token, &key, alg)?;

        let registered = RegisteredClaims::from_payload(&unverified.payload_json)?;
        if registered.iss.as_deref() != Some(self.config.issuer.as_str()) {
            return Err(ValidationError::IssuerMismatch);
        }

        let leeway = i64::try_from(self.config.clock_skew.as_secs()).unwrap_or(i64::MAX);
        let exp = registered.expires_at().ok_or(ValidationError::MalformedToken)?;
        if exp.saturating_add(leeway) <= now {
            return Err(ValidationError::Expired);
        }
        if let Some(nbf) = registered.not_before() {
            if nbf > now.saturating_add(leeway) {
                return Err(ValidationError::NotYetValid);
            }
        }

        if let AudiencePolicy::Require(expected) = &self.config.audience {
            let matched = registered
                .aud
                .as_ref()
                .is_some_and(|aud| aud.contains(expected));
            if !matched {
                return Err(ValidationError::AudienceMismatch);
            }
        }

        let claims = self.extractor.build(&unverified.payload)?;
        tracing::debug!(target: "authkit.validator", sub = %claims.sub, kid, "Token validated");
        Ok(claims)
    }
}
