//! Session Gateway
//!
//! Single-binary service that hosts one federated session:
//! 1. Redirects to the identity provider and processes its callback
//! 2. Exchanges the provider credential for a downstream custom token
//! 3. Signs in to the real-time backend and renews the token hourly
//! 4. Persists the session so a restart resumes it

mod config;
mod metrics;
mod navigator;
mod routes;

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use downstream::{FirebaseAuth, HttpTokenExchange};
use identity::{Auth0Client, CredentialStore};
use session::{Collaborators, SessionCoordinator, SessionOptions, SystemClock};

use crate::config::Config;
use crate::navigator::HttpNavigator;
use crate::routes::{AppState, build_router};

/// Time allowed for in-flight requests after a shutdown signal.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting session-gateway");

    // Install Prometheus metrics recorder before any metrics are emitted
    let prometheus_handle = metrics::install_recorder();

    // CLI: simple --config flag parsing
    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        listen_addr = %config.gateway.listen_addr,
        domain = %config.provider.domain,
        api_root = %config.api.api_root,
        credential_path = %config.gateway.credential_path.display(),
        "configuration loaded"
    );

    let store = CredentialStore::load(config.gateway.credential_path.clone())
        .await
        .with_context(|| {
            format!(
                "failed to load credential store from {}",
                config.gateway.credential_path.display()
            )
        })?;

    let api_key = config
        .downstream
        .api_key
        .clone()
        .context("downstream API key missing")?;

    let client = reqwest::Client::new();
    let navigator = Arc::new(HttpNavigator::new(&config.gateway.default_route));

    let coordinator = SessionCoordinator::new(
        Collaborators {
            provider: Arc::new(Auth0Client::new(config.provider.clone(), client.clone())),
            exchange: Arc::new(HttpTokenExchange::new(
                client.clone(),
                &config.api.api_root,
                Duration::from_secs(config.api.timeout_secs),
            )),
            downstream: Arc::new(FirebaseAuth::with_endpoint(
                client,
                &config.downstream.endpoint,
                api_key,
            )),
            store: Arc::new(store),
            navigator: navigator.clone(),
            clock: Arc::new(SystemClock),
        },
        SessionOptions {
            default_route: config.gateway.default_route.clone(),
            renewal_delay: Duration::from_secs(config.gateway.renewal_secs),
        },
    );

    if let Err(e) = coordinator.resume().await {
        warn!(error = %e, "could not resume persisted session");
    }

    let app_state = AppState {
        coordinator: coordinator.clone(),
        navigator,
        prometheus: prometheus_handle,
        started_at: Instant::now(),
    };

    let app = build_router(app_state, config.gateway.max_connections);

    let listen_addr = config.gateway.listen_addr;
    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind to {listen_addr}"))?;
    info!(addr = %listen_addr, "accepting requests");

    // The drain timeout starts when the shutdown signal fires, not when the
    // server starts.
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    shutdown_signal().await;
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(DRAIN_TIMEOUT, server_handle).await {
        Ok(Ok(Ok(()))) => {
            info!("all in-flight requests drained");
        }
        Ok(Ok(Err(e))) => {
            error!(error = %e, "server error during shutdown");
        }
        Ok(Err(e)) => {
            error!(error = %e, "server task panicked");
        }
        Err(_) => {
            warn!(
                drain_timeout_secs = DRAIN_TIMEOUT.as_secs(),
                "drain timeout exceeded, forcing shutdown"
            );
        }
    }

    // The session stays persisted; only the timer goes.
    coordinator.unschedule_renewal();

    info!("shutdown complete");
    Ok(())
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
