//! Status endpoint handler.
//!
//! `/status` returns the latest health record of every monitored resource
//! as JSON.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, instrument};

use crate::health::HealthRecord;
use crate::state::SharedState;

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub timestamp: DateTime<Utc>,
    pub resources: Vec<HealthRecord>,
}

/// Handler for the /status endpoint.
#[instrument(skip(state))]
pub async fn status_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /status request");

    match state.monitor.get_health_status() {
        Ok(resources) => {
            debug!("Returning status of {} resources", resources.len());
            Json(StatusResponse {
                timestamp: Utc::now(),
                resources,
            })
            .into_response()
        }
        Err(e) => {
            error!("Failed to read health status: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to read health status").into_response()
        }
    }
}
