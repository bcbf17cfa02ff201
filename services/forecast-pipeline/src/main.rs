//! Pacific Northwest forecast map production pipeline.
//!
//! Polls configured weather models, fetches newly published forecast hours
//! through a content-addressed GRIB cache, computes derived fields, and
//! renders and publishes map images, with Prometheus metrics and a health
//! endpoint for monitoring.

mod config;
mod error;
mod fetcher;
mod map_generator;
mod providers;
mod scheduler;
mod server;
mod stations;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::sync::broadcast;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use config::ServiceConfig;
use derived_fields::ModelRegistry;
use pipeline_storage::GribCache;
use providers::ProviderClient;
use renderer::style::StyleConfig;
use scheduler::Scheduler;
use server::ServerState;
use stations::StationCatalog;

#[derive(Parser, Debug)]
#[command(name = "forecast-pipeline")]
#[command(about = "Forecast map production pipeline for the Pacific Northwest")]
struct Args {
    /// Run one poll cycle and exit, instead of polling forever.
    #[arg(long)]
    once: bool,

    /// Path to the service config YAML file.
    #[arg(long, env = "SERVICE_CONFIG", default_value = "config/service.yaml")]
    config_path: PathBuf,

    /// Directory containing per-model config/models/*.yaml (overrides the
    /// value in the service config file when set).
    #[arg(long, env = "CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    /// Published map image directory (overrides the service config file).
    #[arg(long, env = "STORAGE_PATH")]
    storage_path: Option<PathBuf>,

    /// GRIB cache root directory (overrides the service config file).
    #[arg(long, env = "CACHE_ROOT")]
    cache_root: Option<PathBuf>,

    /// Log level.
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Port for the Prometheus metrics + health HTTP server.
    #[arg(long, env = "METRICS_PORT", default_value = "9090")]
    metrics_port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("starting forecast pipeline");

    let mut service_config = ServiceConfig::load(&args.config_path)?;
    if let Some(dir) = args.config_dir {
        service_config.model_config_dir = dir;
    }
    if let Some(path) = args.storage_path {
        service_config.storage_path = path;
    }
    if let Some(root) = args.cache_root {
        service_config.cache_root = root;
    }
    let config = Arc::new(service_config);

    tokio::fs::create_dir_all(&config.storage_path).await?;
    tokio::fs::create_dir_all(&config.cache_root).await?;

    let models = Arc::new(ModelRegistry::load_from_dir(&config.model_config_dir)?);
    let cache = Arc::new(GribCache::new(config.cache_root.clone()));
    let stations = Arc::new(StationCatalog::load(
        &config.station_catalog_path,
        config.station_overrides_path.as_deref(),
    )?);
    let style_path = config
        .style_config_path
        .to_str()
        .with_context(|| format!("style_config_path is not valid UTF-8: {:?}", config.style_config_path))?;
    let styles = Arc::new(StyleConfig::from_file(style_path).map_err(|e| anyhow::anyhow!("{e}"))?);

    let providers: Vec<ProviderClient> = config
        .providers_in_priority_order()
        .iter()
        .cloned()
        .map(ProviderClient::new)
        .collect::<std::result::Result<_, _>>()?;

    let scheduler = Arc::new(Scheduler::new(
        config.clone(),
        models,
        providers,
        cache,
        stations,
        styles,
    ));

    let prometheus_handle = PrometheusBuilder::new().install_recorder()?;

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    if args.once {
        info!("running single poll cycle");
        scheduler.run_once().await;
    } else {
        let server_state = Arc::new(ServerState {
            prometheus_handle,
            scheduler: scheduler.clone(),
        });
        let metrics_port = args.metrics_port;
        tokio::spawn(async move {
            if let Err(e) = server::run_server(server_state, metrics_port).await {
                error!(error = %e, "metrics/health server failed");
            }
        });

        let shutdown_tx_clone = shutdown_tx.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            info!("shutdown signal received");
            shutdown_tx_clone.send(()).ok();
        });

        scheduler.run_forever(shutdown_tx.subscribe()).await;
    }

    info!("forecast pipeline exiting");
    Ok(())
}

/// Waits for SIGTERM or SIGINT. SIGHUP is intentionally left unhandled
/// (ignored, per the default disposition) rather than treated as a restart
/// trigger.
#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");

    tokio::select! {
        _ = sigterm.recv() => {}
        _ = sigint.recv() => {}
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    tokio::signal::ctrl_c().await.ok();
}
