//! HTTP server for health and metrics endpoints

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use eyre::eyre;
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use tracing::info;

use crate::metrics::RelayMetrics;

/// Route served by this relayer instance
#[derive(Debug, Clone, Serialize)]
pub struct RouteInfo {
    pub source_chain_id: u64,
    pub dest_chain_id: u64,
    pub source_domain: u32,
    pub destination_domain: u32,
}

/// Combined app state
#[derive(Clone)]
pub struct AppState {
    pub route: RouteInfo,
    pub metrics: Arc<RelayMetrics>,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub route: RouteInfo,
    pub confirmed: u64,
    pub already_finalized: u64,
    pub failed: u64,
    pub in_flight: i64,
    pub last_source_block: i64,
}

/// Health check endpoint handler
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let metrics = &state.metrics;
    Json(HealthResponse {
        status: "healthy".to_string(),
        route: state.route.clone(),
        confirmed: metrics.outcome_count("confirmed"),
        already_finalized: metrics.outcome_count("already_finalized"),
        failed: metrics.outcome_count("failed"),
        in_flight: metrics.transfers_in_flight.get(),
        last_source_block: metrics.last_source_block.get(),
    })
}

/// Liveness check (always returns OK if server is running)
async fn liveness() -> &'static str {
    "OK"
}

/// Readiness check (ready once the watcher has scanned a block)
async fn readiness(State(state): State<AppState>) -> &'static str {
    if state.metrics.last_source_block.get() > 0 {
        "OK"
    } else {
        "NOT_READY"
    }
}

/// Prometheus metrics endpoint
async fn prometheus_metrics(State(state): State<AppState>) -> Response {
    let encoder = TextEncoder::new();
    let metric_families = state.metrics.registry.gather();
    let mut buffer = Vec::new();

    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return (
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to encode metrics",
        )
            .into_response();
    }

    match Response::builder()
        .header(header::CONTENT_TYPE, encoder.format_type())
        .body(axum::body::Body::from(buffer))
    {
        Ok(resp) => resp,
        Err(_) => (
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to build metrics response",
        )
            .into_response(),
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/healthz", get(liveness))
        .route("/readyz", get(readiness))
        .route("/metrics", get(prometheus_metrics))
        .with_state(state)
}

/// Start the HTTP server for health and metrics
pub async fn start_server(bind_address: &str, port: u16, state: AppState) -> eyre::Result<()> {
    let app = router(state);

    let addr: SocketAddr = format!("{}:{}", bind_address, port)
        .parse()
        .map_err(|e| eyre!("Invalid bind address {}:{}: {}", bind_address, port, e))?;
    info!("Health server listening on {}", addr);
    info!("  /health  - Full health status (JSON)");
    info!("  /metrics - Prometheus metrics");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
