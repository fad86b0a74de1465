use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::db;
use crate::services::metrics::gather_metrics;
use crate::AppState;

/// Root endpoint - basic status
pub async fn root() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": "LiveTV Server",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "runtime": "rust"
    }))
}

/// Health check response
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    uptime: u64,
    storage: &'static str,
    postgres: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    postgres_latency_ms: Option<u64>,
}

/// Check the catalog backend; the in-memory catalog is always up
async fn storage_ok(state: &AppState) -> (&'static str, Option<Option<std::time::Duration>>) {
    match &state.pool {
        Some(pool) => ("postgres", Some(db::ping(pool).await)),
        None => ("memory", None),
    }
}

/// GET /health - Health check with storage status
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let uptime = state.start_time.elapsed().as_secs();
    let (storage, ping) = storage_ok(&state).await;

    let status = match ping {
        Some(None) => "unhealthy",
        _ => "ok",
    };

    Json(HealthResponse {
        status,
        uptime,
        storage,
        postgres: ping.map(|latency| latency.is_some()),
        postgres_latency_ms: ping.flatten().map(|latency| latency.as_millis() as u64),
    })
}

/// GET /metrics - Prometheus metrics
pub async fn metrics() -> impl IntoResponse {
    match gather_metrics() {
        Ok(buffer) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                b"Internal Server Error".to_vec(),
            )
        }
    }
}

/// Readiness probe (for Kubernetes)
pub async fn ready(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match storage_ok(&state).await {
        (_, Some(None)) => (StatusCode::SERVICE_UNAVAILABLE, "not ready - postgres unavailable"),
        _ => (StatusCode::OK, "ready"),
    }
}

/// Liveness probe (for Kubernetes)
pub async fn live() -> impl IntoResponse {
    (StatusCode::OK, "alive")
}
