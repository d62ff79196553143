//! Enclose game server.
//!
//! Pairs WebSocket clients two at a time into game sessions held by a
//! [`Hub`]. Sessions, matchmaking and the rules live in the `enclose` crate;
//! this binary provides configuration, the HTTP listener and shutdown.

use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Error, anyhow};
use enclose::Hub;
use enclose_server::{
    api::{self, AppState, rate_limiter::AdmissionLimiter},
    config::ServerConfig,
    logging, metrics,
};
use log::{error, info, warn};
use pico_args::Arguments;
use tokio::sync::watch;

const HELP: &str = "\
Run the Enclose game server

USAGE:
  enclose_server [OPTIONS]

OPTIONS:
  --bind       IP:PORT     Server socket bind address    [default: env SERVER_BIND or 0.0.0.0:8080]
  --metrics    IP:PORT     Prometheus exporter address   [default: env METRICS_BIND, disabled if unset]

FLAGS:
  -h, --help               Print help information

ENVIRONMENT:
  SERVER_BIND              Server bind address (e.g., 0.0.0.0:8080)
  MAX_SESSIONS             Concurrent session limit
  GRID_SIZE                Board side length for new sessions
  IDLE_TIMEOUT_SECS        Evict participants silent for longer than this
  RUST_LOG                 Log filter (e.g., info,enclose=debug)
  (See .env file for all configuration options)
";

struct Args {
    bind: Option<SocketAddr>,
    metrics: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let args = Args {
        bind: pargs
            .opt_value_from_str("--bind")
            .context("--bind expects IP:PORT")?,
        metrics: pargs
            .opt_value_from_str("--metrics")
            .context("--metrics expects IP:PORT")?,
    };

    logging::init();

    let config = ServerConfig::from_env(args.bind, args.metrics)?;
    config.validate()?;

    info!(
        "Starting Enclose server at {} (max {} sessions, {}x{} board)",
        config.bind,
        config.hub.max_sessions,
        config.hub.session.grid_size,
        config.hub.session.grid_size
    );

    if let Some(addr) = config.metrics_bind {
        metrics::init_metrics(addr).map_err(|e| anyhow!("Failed to start metrics exporter: {e}"))?;
        info!("Prometheus metrics exported on {}", addr);
    }

    let hub = Arc::new(Hub::new(config.hub.clone()));
    let maintenance = hub.spawn_maintenance();

    let limiter = Arc::new(AdmissionLimiter::from_config(&config.rate_limit));
    let limiter_reset = limiter.spawn_reset_task();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let state = AppState::new(hub.clone(), limiter, config.transport, shutdown_rx.clone());
    let app = api::create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind))?;

    info!(
        "Server is running at ws://{}/ws. Press Ctrl+C to stop.",
        config.bind
    );

    let server = {
        let hub = hub.clone();
        async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(shutdown_signal(shutdown_tx, hub))
            .await
        }
    };

    let shutdown_timeout = config.shutdown_timeout;
    let mut deadline_rx = shutdown_rx;
    let deadline = async move {
        if deadline_rx.wait_for(|stopping| *stopping).await.is_ok() {
            tokio::time::sleep(shutdown_timeout).await;
        } else {
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        result = server => result.context("Server error")?,
        _ = deadline => warn!(
            "Graceful shutdown exceeded {:?}, exiting",
            shutdown_timeout
        ),
    }

    maintenance.abort();
    limiter_reset.abort();
    info!("Server stopped");

    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM, then tell every connection and session to
/// wind down.
async fn shutdown_signal(shutdown_tx: watch::Sender<bool>, hub: Arc<Hub>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutting down server...");
    shutdown_tx.send_replace(true);
    hub.stop().await;
}
