// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::{KeyCache, RequestGate};
use crate::config::{Settings, ValidationConfig};

#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<RequestGate>,
}

impl AppState {
    pub fn new(keys: Arc<KeyCache>, config: ValidationConfig) -> Self {
        Self {
            gate: Arc::new(RequestGate::from_parts(keys, Arc::new(config))),
        }
    }

    /// One JWKS cache for the whole service, fetched over HTTPS.
    pub fn from_settings(settings: &Settings) -> Self {
        let keys =
            KeyCache::from_url(settings.jwks_url.clone()).with_cache_ttl(settings.jwks_cache_ttl);
        Self::new(Arc::new(keys), settings.validation.clone())
    }

    pub fn key_cache(&self) -> &Arc<KeyCache> {
        self.gate.validator().key_cache()
    }
}
