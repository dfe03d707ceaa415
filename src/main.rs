// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::net::SocketAddr;
use std::process::ExitCode;

use relational_authkit::api::{router, PUBLIC_ROUTES};
use relational_authkit::config::{LogFormat, Settings};
use relational_authkit::state::AppState;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,authkit=debug,tower_http=info"));

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(fmt::layer()).init(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> ExitCode {
    let mut settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };
    init_tracing(settings.log_format);

    settings.validation = settings.validation.with_skip_paths(PUBLIC_ROUTES);

    let addr: SocketAddr = match format!("{}:{}", settings.host, settings.port).parse() {
        Ok(addr) => addr,
        Err(e) => {
            tracing::error!(
                host = %settings.host,
                port = settings.port,
                error = %e,
                "Invalid bind address"
            );
            return ExitCode::FAILURE;
        }
    };

    let state = AppState::from_settings(&settings);

    // Warm the key cache. A failed warm-up does not start the refresh
    // interval, so the first request retries the fetch.
    if let Err(e) = state.key_cache().force_refresh().await {
        tracing::warn!(jwks_url = %settings.jwks_url, error = %e, "Initial JWKS fetch failed");
    }

    tracing::info!(
        issuer = %settings.validation.issuer,
        audience = ?settings.validation.audience,
        skip_paths = ?settings.validation.skip_paths,
        "Initialized authentication middleware"
    );

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(%addr, error = %e, "Failed to bind listener");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(%addr, "Authkit demo server listening");

    if let Err(e) = axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "Server error");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
