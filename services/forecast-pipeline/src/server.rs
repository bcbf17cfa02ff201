//! Metrics/health HTTP server (spec `4.9`): a small `axum` router exposing
//! `/metrics` (Prometheus text exposition, via `metrics-exporter-prometheus`)
//! and `/health`. Replaces the prior downloader's rich status/downloads/
//! schedule/timeseries/retry dashboard API, which had no counterpart once
//! per-download tracking moved into the scheduler's run-state table.

use std::sync::Arc;

use axum::{extract::Extension, response::IntoResponse, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use sysinfo::System;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::scheduler::Scheduler;

pub struct ServerState {
    pub prometheus_handle: PrometheusHandle,
    pub scheduler: Arc<Scheduler>,
}

/// Builds the metrics/health router.
pub fn create_router(state: Arc<ServerState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(Extension(state))
}

/// GET /metrics - Prometheus text exposition. Samples `memory_available_bytes`
/// on each scrape rather than on a timer, since the gauge only needs to be
/// current at read time.
async fn metrics_handler(Extension(state): Extension<Arc<ServerState>>) -> impl IntoResponse {
    let mut sys = System::new();
    sys.refresh_memory();
    metrics::gauge!("memory_available_bytes").set(sys.available_memory() as f64);

    state.prometheus_handle.render()
}

/// GET /health - liveness probe. Reports `ok` as long as the process is
/// accepting requests; run-level health (stalled runs, abandoned models) is
/// tracked by `fetches_attempted`/`maps_generated` counters on `/metrics`
/// instead of duplicated here.
async fn health_handler(Extension(state): Extension<Arc<ServerState>>) -> impl IntoResponse {
    let active_runs = state.scheduler.run_state().active_runs().await.len();
    axum::Json(serde_json::json!({
        "status": "ok",
        "service": "forecast-pipeline",
        "active_runs": active_runs,
    }))
}

/// Starts the metrics/health HTTP server.
pub async fn run_server(state: Arc<ServerState>, port: u16) -> anyhow::Result<()> {
    let app = create_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    info!(port = port, "starting metrics/health server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
