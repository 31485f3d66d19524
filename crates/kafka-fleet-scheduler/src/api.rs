use crate::Scheduler;
use axum::{extract::State, routing::get, Json, Router};
use kafka_fleet_core::Broker;
use prometheus::{Encoder, TextEncoder};
use std::path::Path;
use std::sync::Arc;
use tower_http::services::ServeDir;
use tracing::error;

/// Artifact and status routes.
///
/// `/executor/<jar>` and `/kafka/<distribution>` serve the files the
/// executor's CommandInfo URIs point at; the rest is read-only operator
/// surface.
pub fn create_api(scheduler: Arc<Scheduler>, artifact_dir: &Path) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/brokers", get(list_brokers))
        .route("/metrics", get(metrics_handler))
        .nest_service("/executor", ServeDir::new(artifact_dir))
        .nest_service("/kafka", ServeDir::new(artifact_dir))
        .with_state(scheduler)
}

async fn health() -> &'static str {
    "OK"
}

/// Snapshot of the declared brokers, never a live alias into the cluster
async fn list_brokers(State(scheduler): State<Arc<Scheduler>>) -> Json<Vec<Broker>> {
    Json(scheduler.broker_snapshot())
}

async fn metrics_handler(State(scheduler): State<Arc<Scheduler>>) -> String {
    let metrics = scheduler.metrics();
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metrics.registry.gather(), &mut buffer) {
        error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
