// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWKS (JSON Web Key Set) fetching and caching.
//!
//! ## Security
//!
//! - Only RSA keys published for signature use (`use = "sig"`) are retained
//! - Keys are cached with a TTL; unknown key ids trigger a refresh
//! - Stale keys are kept on fetch failure (fail-open for availability)
//! - Concurrent refreshes are coalesced into a single request
//!
//! ## Usage
//!
//! Build one [`KeyCache`] per service at startup and hand it to the
//! [`TokenValidator`](super::TokenValidator).

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use jsonwebtoken::DecodingKey;
use serde::Deserialize;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::instrument;

use super::error::{KeyCacheError, KeySourceError};

/// Default JWKS cache TTL (1 hour).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Minimum spacing between two fetches of the key set (30 seconds).
pub const DEFAULT_MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// Client-side timeout for a single JWKS request.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Providers disagree on padding for `n` and `e`.
const JWK_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Key family of a [`SigningKey`]. Only RSA is accepted for signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFamily {
    Rsa,
}

/// A public key published by the identity provider.
#[derive(Clone)]
pub struct SigningKey {
    kid: String,
    family: KeyFamily,
    modulus: Vec<u8>,
    exponent: Vec<u8>,
    algorithm: Option<String>,
    decoding_key: DecodingKey,
}

impl SigningKey {
    /// Build an RSA key from base64url-encoded modulus and exponent.
    pub fn from_rsa_components(
        kid: impl Into<String>,
        n: &str,
        e: &str,
        algorithm: Option<String>,
    ) -> Result<Self, KeySourceError> {
        let modulus = JWK_BASE64
            .decode(n)
            .map_err(|err| KeySourceError::Decode(format!("invalid modulus: {err}")))?;
        let exponent = JWK_BASE64
            .decode(e)
            .map_err(|err| KeySourceError::Decode(format!("invalid exponent: {err}")))?;
        if modulus.is_empty() || exponent.is_empty() {
            return Err(KeySourceError::Decode(
                "empty modulus or exponent".to_string(),
            ));
        }

        let decoding_key = DecodingKey::from_rsa_raw_components(&modulus, &exponent);
        Ok(Self {
            kid: kid.into(),
            family: KeyFamily::Rsa,
            modulus,
            exponent,
            algorithm,
            decoding_key,
        })
    }

    pub fn kid(&self) -> &str {
        &self.kid
    }

    pub fn family(&self) -> KeyFamily {
        self.family
    }

    /// Big-endian modulus bytes.
    pub fn modulus(&self) -> &[u8] {
        &self.modulus
    }

    /// Big-endian public exponent bytes.
    pub fn exponent(&self) -> &[u8] {
        &self.exponent
    }

    /// The `alg` the provider declared for this key, if any.
    pub fn algorithm(&self) -> Option<&str> {
        self.algorithm.as_deref()
    }

    pub(crate) fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("kid", &self.kid)
            .field("family", &self.family)
            .field("modulus_bits", &(self.modulus.len() * 8))
            .field("algorithm", &self.algorithm)
            .finish()
    }
}

/// A single entry of the key-discovery response.
#[derive(Debug, Clone, Deserialize)]
pub struct JwkEntry {
    pub kty: String,
    #[serde(default)]
    pub kid: Option<String>,
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,
    #[serde(default)]
    pub alg: Option<String>,
    #[serde(default)]
    pub n: Option<String>,
    #[serde(default)]
    pub e: Option<String>,
}

/// The key-discovery response body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JwksDocument {
    pub keys: Vec<JwkEntry>,
}

impl JwksDocument {
    /// Decode every usable signing key, skipping entries that are not RSA
    /// signature keys or cannot be decoded.
    pub fn signing_keys(&self) -> HashMap<String, Arc<SigningKey>> {
        let mut keys = HashMap::with_capacity(self.keys.len());
        for entry in &self.keys {
            if entry.kty != "RSA" || entry.key_use.as_deref() != Some("sig") {
                continue;
            }
            let (Some(kid), Some(n), Some(e)) = (&entry.kid, &entry.n, &entry.e) else {
                tracing::debug!(
                    target: "authkit.jwks",
                    kid = ?entry.kid,
                    "Skipping incomplete JWK"
                );
                continue;
            };
            match SigningKey::from_rsa_components(kid.clone(), n, e, entry.alg.clone()) {
                Ok(key) => {
                    keys.insert(kid.clone(), Arc::new(key));
                }
                Err(e) => {
                    tracing::warn!(
                        target: "authkit.jwks",
                        kid = %kid,
                        error = %e,
                        "Skipping undecodable JWK"
                    );
                }
            }
        }
        keys
    }
}

/// Where the cache gets its keys from.
#[async_trait]
pub trait SigningKeySource: Send + Sync {
    async fn fetch(&self) -> Result<JwksDocument, KeySourceError>;
}

/// Fetches the key set from the provider over HTTPS.
#[derive(Debug, Clone)]
pub struct HttpKeySource {
    jwks_url: String,
    client: reqwest::Client,
}

impl HttpKeySource {
    /// # Arguments
    /// - `jwks_url`: the key-discovery endpoint (e.g. `https://idp.example/oauth/v2/keys`)
    pub fn new(jwks_url: impl Into<String>) -> Self {
        Self::with_timeout(jwks_url, DEFAULT_FETCH_TIMEOUT)
    }

    pub fn with_timeout(jwks_url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(
                    target: "authkit.jwks",
                    error = %e,
                    "Failed to build HTTP client with custom config, using defaults"
                );
                reqwest::Client::new()
            });
        Self {
            jwks_url: jwks_url.into(),
            client,
        }
    }

    pub fn jwks_url(&self) -> &str {
        &self.jwks_url
    }
}

#[async_trait]
impl SigningKeySource for HttpKeySource {
    async fn fetch(&self) -> Result<JwksDocument, KeySourceError> {
        tracing::debug!(target: "authkit.jwks", url = %self.jwks_url, "Fetching JWKS");

        let response = self.client.get(&self.jwks_url).send().await?;

        if !response.status().is_success() {
            return Err(KeySourceError::Status(response.status().as_u16()));
        }

        response
            .json::<JwksDocument>()
            .await
            .map_err(|e| KeySourceError::Decode(e.to_string()))
    }
}

/// One complete generation of the key set.
#[derive(Default)]
struct KeySet {
    keys: HashMap<String, Arc<SigningKey>>,
    fetched_at: Option<Instant>,
}

impl KeySet {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.fetched_at.is_some_and(|at| at.elapsed() < ttl)
    }

    fn get(&self, kid: &str) -> Option<Arc<SigningKey>> {
        self.keys.get(kid).cloned()
    }
}

/// Concurrency-safe cache of the provider's signing keys.
///
/// Readers share an `Arc` snapshot that is swapped wholesale on refresh, so a
/// lookup never sees a half-updated set and is never blocked by an in-flight
/// fetch. Fetches are serialized behind `refresh_gate`; callers that queued
/// behind a fetch reuse its outcome instead of issuing their own.
pub struct KeyCache {
    source: Arc<dyn SigningKeySource>,
    snapshot: RwLock<Arc<KeySet>>,
    /// Holds the time the last fetch attempt finished, successful or not.
    /// A fetch whose caller was dropped mid-flight is not recorded.
    refresh_gate: Mutex<Option<Instant>>,
    /// Completed fetch attempts.
    attempts: AtomicU64,
    ttl: Duration,
    min_refresh_interval: Duration,
}

impl KeyCache {
    pub fn new(source: impl SigningKeySource + 'static) -> Self {
        Self::with_source(Arc::new(source))
    }

    pub fn with_source(source: Arc<dyn SigningKeySource>) -> Self {
        Self {
            source,
            snapshot: RwLock::new(Arc::new(KeySet::default())),
            refresh_gate: Mutex::new(None),
            attempts: AtomicU64::new(0),
            ttl: DEFAULT_CACHE_TTL,
            min_refresh_interval: DEFAULT_MIN_REFRESH_INTERVAL,
        }
    }

    /// Cache backed by [`HttpKeySource`] for the given URL.
    pub fn from_url(jwks_url: impl Into<String>) -> Self {
        Self::new(HttpKeySource::new(jwks_url))
    }

    /// Create with custom cache TTL.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    pub fn cache_ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up the key for `kid`, refreshing the set when it is stale or
    /// does not contain `kid`.
    ///
    /// # Errors
    ///
    /// `FetchFailed` only for the caller whose fetch failed; callers that
    /// waited on that fetch are served from the retained key set.
    /// `NotFound` when the key set (fresh or retained) has no such key.
    #[instrument(skip(self), fields(kid = %kid))]
    pub async fn get_key(&self, kid: &str) -> Result<Arc<SigningKey>, KeyCacheError> {
        // Read before the snapshot so a refresh that lands in between is
        // detected below.
        let observed = self.attempts.load(Ordering::Acquire);
        {
            let snapshot = self.snapshot.read().await;
            if snapshot.is_fresh(self.ttl) {
                if let Some(key) = snapshot.get(kid) {
                    tracing::debug!(target: "authkit.jwks", "JWKS cache hit");
                    return Ok(key);
                }
            }
        }

        let refreshed = self.refresh_throttled(observed).await?;

        self.current().await.get(kid).ok_or_else(|| {
            if refreshed {
                tracing::warn!(target: "authkit.jwks", "Key not found in JWKS after refresh");
            }
            KeyCacheError::NotFound(kid.to_string())
        })
    }

    /// Refresh a stale key set, subject to the same throttling and coalescing
    /// as [`get_key`](Self::get_key).
    ///
    /// Returns `true` when this call performed a fetch. Safe to expose to
    /// unauthenticated callers such as a health endpoint.
    pub async fn refresh_if_due(&self) -> Result<bool, KeyCacheError> {
        let observed = self.attempts.load(Ordering::Acquire);
        if self.is_fresh().await {
            return Ok(false);
        }
        self.refresh_throttled(observed).await
    }

    /// Fetch the key set now, regardless of freshness or throttling.
    ///
    /// A failed forced fetch does not start the refresh interval, so the next
    /// lookup may retry immediately.
    pub async fn force_refresh(&self) -> Result<(), KeyCacheError> {
        let mut last_attempt = self.refresh_gate.lock().await;
        let outcome = self.refresh_locked().await;
        if outcome.is_ok() {
            *last_attempt = Some(Instant::now());
        }
        self.attempts.fetch_add(1, Ordering::Release);
        outcome
    }

    /// Check if the cached key set is within its TTL.
    pub async fn is_fresh(&self) -> bool {
        self.snapshot.read().await.is_fresh(self.ttl)
    }

    /// Number of keys in the current snapshot.
    pub async fn key_count(&self) -> usize {
        self.snapshot.read().await.keys.len()
    }

    /// Fetch unless a fetch completed since `observed` or the last attempt is
    /// within `min_refresh_interval`. Returns whether a fetch ran.
    ///
    /// The attempt is recorded only after the fetch returns, so a caller that
    /// is cancelled mid-fetch leaves the next caller free to retry.
    async fn refresh_throttled(&self, observed: u64) -> Result<bool, KeyCacheError> {
        let mut last_attempt = self.refresh_gate.lock().await;

        let coalesced = self.attempts.load(Ordering::Acquire) != observed;
        let throttled = last_attempt.is_some_and(|at| at.elapsed() < self.min_refresh_interval);
        if coalesced || throttled {
            tracing::debug!(
                target: "authkit.jwks",
                coalesced,
                throttled,
                "Serving key set without refetching"
            );
            return Ok(false);
        }

        let outcome = self.refresh_locked().await;
        *last_attempt = Some(Instant::now());
        self.attempts.fetch_add(1, Ordering::Release);
        outcome.map(|()| true)
    }

    async fn current(&self) -> Arc<KeySet> {
        Arc::clone(&*self.snapshot.read().await)
    }

    /// Caller must hold `refresh_gate`.
    #[instrument(skip_all)]
    async fn refresh_locked(&self) -> Result<(), KeyCacheError> {
        let document = self.source.fetch().await.map_err(|e| {
            tracing::error!(
                target: "authkit.jwks",
                error = %e,
                "Failed to refresh JWKS, keeping previous key set"
            );
            KeyCacheError::FetchFailed(e)
        })?;

        let keys = document.signing_keys();
        tracing::info!(
            target: "authkit.jwks",
            key_count = keys.len(),
            published = document.keys.len(),
            "JWKS cache refreshed"
        );

        let next = Arc::new(KeySet {
            keys,
            fetched_at: Some(Instant::now()),
        });
        *self.snapshot.write().await = next;
        Ok(())
    }
}

impl fmt::Debug for KeyCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyCache")
            .field("ttl", &self.ttl)
            .field("min_refresh_interval", &self.min_refresh_interval)
            .field("attempts", &self.attempts.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
