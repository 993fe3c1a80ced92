//! Binary crate for the weather relay HTTP service.
//!
//! This crate focuses on:
//! - Parsing CLI arguments
//! - Wiring configuration into the upstream client
//! - Serving the relay routes until shutdown

use anyhow::Context;
use clap::Parser;
use relay_core::{Config, OpenWeatherUpstream};
use std::{net::SocketAddr, path::PathBuf, sync::Arc};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

mod routes;

/// HTTP relay in front of the OpenWeather current-weather API.
#[derive(Debug, Parser)]
#[command(name = "weather-relay", version, about = "Weather relay server")]
struct Args {
    /// Socket address to listen on; overrides RELAY_BIND and the config file.
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Path to a TOML config file; overrides RELAY_CONFIG.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.bind = bind;
    }
    debug!(?config, "resolved configuration");

    let upstream = OpenWeatherUpstream::new(&config)?;
    let state = routes::AppState { upstream: Arc::new(upstream) };

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind listener on {}", config.bind))?;

    info!(addr = %config.bind, "weather relay listening");

    axum::serve(listener, routes::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server terminated abnormally")?;

    Ok(())
}

/// Resolves on SIGTERM or Ctrl-C, whichever arrives first.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl-C handler");
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
        () = ctrl_c => {}
        _ = terminate => {}
    }
}
