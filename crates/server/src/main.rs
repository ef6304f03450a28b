//! Clubhub server entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clubhub_api::{AppState, app};
use clubhub_client::BackendClient;
use clubhub_common::{Config, config::LogFormat};
use clubhub_core::SystemClock;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "clubhub=debug,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::load().context("failed to load configuration")?;

    init_tracing(config.server.log_format);
    info!("Starting clubhub server...");

    let backend = BackendClient::new(&config.backend).context("failed to create backend client")?;
    info!(base_url = %backend.base_url(), "Using club backend");

    let state = AppState::new(
        Arc::new(backend),
        Arc::new(SystemClock),
        config.enforcement.clone(),
    );

    // Start server with graceful shutdown
    let ip = config
        .server
        .host
        .parse()
        .with_context(|| format!("invalid server host: {}", config.server.host))?;
    let addr = SocketAddr::new(ip, config.server.port);
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
