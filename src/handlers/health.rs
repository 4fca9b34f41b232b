//! Liveness endpoint handler.

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, instrument};

use crate::state::SharedState;

/// Footer text for human-readable HTTP endpoints.
pub const FOOTER_TEXT: &str = "Project: https://github.com/matzefriedrich/az-health-exporter";

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: i64,
}

/// Handler for the /health endpoint. Reports the process as alive regardless
/// of the state of monitored resources.
#[instrument(skip(state))]
pub async fn health_handler(State(state): State<SharedState>) -> Json<HealthResponse> {
    debug!("Processing /health request");

    let now = Utc::now();
    Json(HealthResponse {
        status: "healthy",
        timestamp: now,
        uptime_seconds: (now - state.started_at).num_seconds(),
    })
}
