mod state;
mod ws;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use clap::Parser;
use ferri_core::config::{load_config, EngineConfig};
use ferri_core::dispatcher::EngineShared;
use ferri_core::logger::init_logger;
use ferri_core::source::registry_from_config;
use ferri_core::tree::cache::TreeCache;
use tracing::info;

use crate::state::AppState;

/// Multi-source log exploration server.
#[derive(Debug, Parser)]
struct Cli {
    /// Path to a TOML config file, overriding the default beside the binary.
    #[arg(long, env = "FERRI_CONFIG")]
    config: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = match cli.config {
        Some(path) => EngineConfig::load_from_file(path)?,
        None => load_config()?,
    };
    let _guards = init_logger(&cfg)?;

    let registry = registry_from_config(&cfg)?;
    info!(sources = registry.len(), "source registry built");

    let dispatch = ferri_core::parser::ParserDispatch::default();
    let shared = Arc::new(EngineShared { registry, dispatch, cache: TreeCache::new(), config: cfg.clone() });
    let state = AppState { shared };

    let app = Router::new().route("/ws", get(ws::upgrade)).with_state(state);

    let addr = format!("{}:{}", cfg.addr, cfg.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "listening");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received, draining connections");
}
