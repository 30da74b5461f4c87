//! HTTP server for health and metrics endpoints

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use eyre::eyre;
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use tracing::info;

use crate::coordinator::{Coordinator, CoordinatorStatus};
use crate::metrics;
use crate::queue::CommandQueue;

/// Shared state for the health server
#[derive(Clone)]
pub struct ApiState {
    pub peer_id: u32,
    pub coordinator: Arc<Coordinator>,
    pub queue: Arc<CommandQueue>,
    pub started: Instant,
}

#[derive(Serialize)]
struct StatusResponse {
    status: String,
    peer_id: u32,
    uptime_seconds: u64,
    queue_depth: usize,
    coordinator: CoordinatorStatus,
}

/// Liveness probe (always returns OK if the server is running)
async fn liveness() -> &'static str {
    "OK"
}

async fn status(State(state): State<ApiState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok".to_string(),
        peer_id: state.peer_id,
        uptime_seconds: state.started.elapsed().as_secs(),
        queue_depth: state.queue.len(),
        coordinator: state.coordinator.status(),
    })
}

/// Prometheus metrics endpoint
async fn prometheus_metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return (
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to encode metrics",
        )
            .into_response();
    }

    (
        [(axum::http::header::CONTENT_TYPE, encoder.format_type())],
        buffer,
    )
        .into_response()
}

/// Start the health/metrics server.
pub async fn start_health_server(addr: &str, state: ApiState) -> eyre::Result<()> {
    let app = Router::new()
        .route("/healthz", get(liveness))
        .route("/status", get(status))
        .route("/metrics", get(prometheus_metrics))
        .with_state(state);

    let addr: SocketAddr = addr
        .parse()
        .map_err(|e| eyre!("Invalid health address {}: {}", addr, e))?;
    info!(%addr, "health server listening");

    metrics::UP.set(1.0);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
