// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variable names, defaults, and the validation settings shared by
//! every request. Configuration is loaded from the environment at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `AUTH_ISSUER_URL` | Expected `iss` claim, exact match | Required |
//! | `AUTH_AUDIENCE` | Expected `aud` entry (project id) | Required unless skipped |
//! | `AUTH_SKIP_AUDIENCE_CHECK` | `true` to accept any audience | `false` |
//! | `AUTH_SKIP_PATHS` | Comma-separated routes that bypass auth | empty |
//! | `AUTH_JWKS_URL` | Key-discovery endpoint | `<issuer>/oauth/v2/keys` |
//! | `AUTH_JWKS_CACHE_TTL_SECS` | JWKS cache TTL | `3600` |
//! | `AUTH_CLOCK_SKEW_SECS` | Leeway for `exp`/`nbf` | `0` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `3000` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::time::Duration;

use crate::auth::claims::ClaimNames;
use crate::auth::jwks::DEFAULT_CACHE_TTL;

pub const ISSUER_URL_ENV: &str = "AUTH_ISSUER_URL";
pub const AUDIENCE_ENV: &str = "AUTH_AUDIENCE";
pub const SKIP_AUDIENCE_CHECK_ENV: &str = "AUTH_SKIP_AUDIENCE_CHECK";
pub const SKIP_PATHS_ENV: &str = "AUTH_SKIP_PATHS";
pub const JWKS_URL_ENV: &str = "AUTH_JWKS_URL";
pub const JWKS_CACHE_TTL_ENV: &str = "AUTH_JWKS_CACHE_TTL_SECS";
pub const CLOCK_SKEW_ENV: &str = "AUTH_CLOCK_SKEW_SECS";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Path of the key-discovery endpoint relative to the issuer (Zitadel layout).
pub const DEFAULT_JWKS_PATH: &str = "/oauth/v2/keys";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has invalid value {value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
    #[error("no audience configured: set AUTH_AUDIENCE or explicitly set AUTH_SKIP_AUDIENCE_CHECK=true")]
    AudienceUnspecified,
}

/// Whether the `aud` claim is checked.
///
/// Skipping is an explicit choice; an empty audience string never disables
/// the check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudiencePolicy {
    /// The token's `aud` (string or list) must contain this value.
    Require(String),
    /// Accept tokens regardless of audience.
    Skip,
}

/// Settings for token validation, built once and shared by all requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationConfig {
    pub issuer: String,
    pub audience: AudiencePolicy,
    /// Route patterns that bypass authentication. Exact match.
    pub skip_paths: Vec<String>,
    /// Leeway applied to `exp` and `nbf`.
    pub clock_skew: Duration,
    pub claim_names: ClaimNames,
}

impl ValidationConfig {
    pub fn new(issuer: impl Into<String>, audience: AudiencePolicy) -> Self {
        Self {
            issuer: issuer.into(),
            audience,
            skip_paths: Vec::new(),
            clock_skew: Duration::ZERO,
            claim_names: ClaimNames::default(),
        }
    }

    /// Add routes that bypass authentication. Duplicates are dropped, order kept.
    pub fn with_skip_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for path in paths {
            let path = path.into();
            if !self.skip_paths.contains(&path) {
                self.skip_paths.push(path);
            }
        }
        self
    }

    pub fn with_clock_skew(mut self, leeway: Duration) -> Self {
        self.clock_skew = leeway;
        self
    }

    pub fn with_claim_names(mut self, names: ClaimNames) -> Self {
        self.claim_names = names;
        self
    }

    pub fn is_skipped(&self, route: &str) -> bool {
        self.skip_paths.iter().any(|p| p == route)
    }

    /// Default key-discovery URL for this issuer.
    pub fn default_jwks_url(&self) -> String {
        format!("{}{}", self.issuer.trim_end_matches('/'), DEFAULT_JWKS_PATH)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

/// Everything the service reads from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub validation: ValidationConfig,
    pub jwks_url: String,
    pub jwks_cache_ttl: Duration,
    pub host: String,
    pub port: u16,
    pub log_format: LogFormat,
}

impl Settings {
    /// Load settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load settings through `lookup`; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let issuer = get(ISSUER_URL_ENV).ok_or(ConfigError::Missing(ISSUER_URL_ENV))?;

        let skip_audience = match get(SKIP_AUDIENCE_CHECK_ENV) {
            Some(value) => parse_bool(SKIP_AUDIENCE_CHECK_ENV, &value)?,
            None => false,
        };
        let audience = match (get(AUDIENCE_ENV), skip_audience) {
            (Some(aud), _) => AudiencePolicy::Require(aud),
            (None, true) => AudiencePolicy::Skip,
            (None, false) => return Err(ConfigError::AudienceUnspecified),
        };

        let skip_paths: Vec<String> = get(SKIP_PATHS_ENV)
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let clock_skew = match get(CLOCK_SKEW_ENV) {
            Some(value) => Duration::from_secs(parse_number(CLOCK_SKEW_ENV, &value)?),
            None => Duration::ZERO,
        };

        let validation = ValidationConfig::new(issuer, audience)
            .with_skip_paths(skip_paths)
            .with_clock_skew(clock_skew);

        let jwks_url = get(JWKS_URL_ENV).unwrap_or_else(|| validation.default_jwks_url());

        let jwks_cache_ttl = match get(JWKS_CACHE_TTL_ENV) {
            Some(value) => Duration::from_secs(parse_number(JWKS_CACHE_TTL_ENV, &value)?),
            None => DEFAULT_CACHE_TTL,
        };

        let port = match get(PORT_ENV) {
            Some(value) => value.parse::<u16>().map_err(|e| ConfigError::Invalid {
                name: PORT_ENV,
                value,
                reason: e.to_string(),
            })?,
            None => DEFAULT_PORT,
        };

        let log_format = match get(LOG_FORMAT_ENV).as_deref() {
            Some("json") => LogFormat::Json,
            Some("pretty") | None => LogFormat::Pretty,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: LOG_FORMAT_ENV,
                    value: other.to_string(),
                    reason: "expected `json` or `pretty`".to_string(),
                })
            }
        };

        Ok(Self {
            validation,
            jwks_url,
            jwks_cache_ttl,
            host: get(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            log_format,
        })
    }
}

fn parse_bool(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name,
            value: value.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}

fn parse_number(name: &'static str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|e| ConfigError::Invalid {
        name,
        value: value.to_string(),
        reason: e.to_string(),
    })
}
