//! Forecast API Server
//!
//! Serves nearest-point and bounding-box lookups over local GRIB2 files.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use forecast_api::cleanup::CacheClearTask;
use forecast_api::config::{Args, ServiceConfig};
use forecast_api::state::AppState;

fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Build runtime with configured threads
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();

    if let Some(threads) = args.worker_threads {
        runtime_builder.worker_threads(threads);
    }

    let runtime = runtime_builder
        .build()
        .context("Failed to create Tokio runtime")?;

    runtime.block_on(run_server(args))
}

async fn run_server(args: Args) -> Result<()> {
    // Initialize tracing
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .json()
        .init();

    let config = ServiceConfig::from_args(&args)?;

    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;
    info!("Prometheus metrics exporter initialized");

    info!(
        forecasts_dir = %config.forecasts_dir.display(),
        decode_workers = config.decode_workers,
        disk_store = config.cache_dir.is_some(),
        "Starting forecast API server"
    );

    let state = Arc::new(AppState::new(config.clone())?.with_prometheus(prometheus_handle));

    // Shutdown signal
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let clear_task = tokio::spawn(CacheClearTask::new(state.clone()).run(shutdown_tx.subscribe()));

    let app = forecast_api::build_router(state);

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;
    info!(addr = %config.listen_addr, "Forecast API listening");

    let signal_tx = shutdown_tx.clone();
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::signal::ctrl_c().await.ok();
            info!("Received shutdown signal");
            signal_tx.send(()).ok();
        })
        .await;

    // Stop the background task even if the server failed
    shutdown_tx.send(()).ok();
    clear_task.await.ok();

    served.context("Server failed")?;
    info!("Forecast API stopped");
    Ok(())
}
