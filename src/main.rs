//! Sizecast: next-outcome predictor and backtester for number/color draws
//!
//! Entry point. Initialises structured logging, loads configuration,
//! loads the model artifact if one exists, opens the history store and
//! serves the HTTP API until Ctrl+C.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, warn};

use sizecast::api;
use sizecast::config;
use sizecast::engine::PredictionService;
use sizecast::model::load_model;
use sizecast::storage::JsonlHistoryStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    init_logging();

    let config_path = std::env::var("SIZECAST_CONFIG").unwrap_or_else(|_| "config.toml".into());
    let cfg = match config::AppConfig::load(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(config = %config_path, error = %format!("{e:#}"), "Failed to load configuration");
            return Err(e);
        }
    };

    let settings = cfg.prediction_settings();
    info!(
        config = %config_path,
        default_take = settings.default_take,
        feature_window = settings.feature_window,
        backtest_window = settings.default_backtest_window,
        "Sizecast starting up"
    );

    // -- Initialise components -------------------------------------------

    let model = match cfg.model_path() {
        Some(path) => load_model(&path),
        None => {
            warn!("No model path configured, running heuristic-only");
            None
        }
    };

    let store = Arc::new(JsonlHistoryStore::new(cfg.history_path()));
    let service = Arc::new(PredictionService::new(store, model, settings));

    // -- Serve -----------------------------------------------------------

    let addr: SocketAddr = format!("{}:{}", cfg.server.host, cfg.server.port)
        .parse()
        .with_context(|| {
            format!("Invalid server address {}:{}", cfg.server.host, cfg.server.port)
        })?;

    api::serve(service, addr, shutdown_signal()).await?;

    info!("Sizecast shut down cleanly.");
    Ok(())
}

/// Resolves on Ctrl+C.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received.");
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("sizecast=info"));

    let json_logging = std::env::var("SIZECAST_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
