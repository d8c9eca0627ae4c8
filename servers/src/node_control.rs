//! # Node Control Server
//!
//! HTTP control surface for a locally running proxy engine. It lets an
//! operator (or an automation agent) refresh the node pool and steer the
//! engine without shell access:
//!
//! - `POST /update` starts the refresh pipeline in the background, one run at a time;
//! - `GET /status` reports the state and the result of the latest run;
//! - `POST /switch` changes the active node of a selector group;
//! - `GET /nodes` lists the members of a group with their last measured delay;
//! - `GET /health` reports whether this server and the engine are alive.
//!
//! Configuration comes from command-line flags, environment variables and an
//! optional `.env` file, in that order of precedence.

use anyhow::{Context, Result};
use clap::Parser;
use lib_common::engine::EngineClient;
use lib_common::loggers::init_tracing;
use lib_common::orchestrator::UpdateOrchestrator;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

mod control_logic;
use control_logic::config::Config;
use control_logic::routes::router;
use control_logic::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::parse();
    config.validate().context("invalid configuration")?;

    let _log_guard = init_tracing("node_control", config.log_dir.as_deref(), &config.log_level)
        .context("failed to initialise logging")?;

    let engine = EngineClient::new(&config.engine()).context("failed to build the engine client")?;
    let pipeline = config.pipeline();
    info!(
        engine = %engine.base_url(),
        program = %pipeline.program.display(),
        args = ?pipeline.args,
        timeout_secs = pipeline.timeout.as_secs(),
        "node control starting"
    );
    let state = AppState::new(UpdateOrchestrator::new(pipeline), engine);

    let addr = config.listen_addr();
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("node control stopped");
    Ok(())
}

/// Resolves on CTRL+C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
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
    warn!("shutdown signal received, closing server");
}
