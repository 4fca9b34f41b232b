//! HTTP endpoint handlers for the exporter.
//!
//! This module provides handlers for all HTTP endpoints:
//! - `/metrics`: Prometheus metrics endpoint
//! - `/status`: JSON snapshot of the latest health records
//! - `/health`: Liveness endpoint
//! - `/doc`: Documentation endpoint

pub mod doc;
pub mod health;
pub mod metrics;
pub mod status;

use axum::{routing::get, Router};

use crate::state::SharedState;

// Re-export handlers
pub use doc::doc_handler;
pub use health::health_handler;
pub use metrics::metrics_handler;
pub use status::status_handler;

/// Builds the exporter's router.
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/status", get(status_handler))
        .route("/health", get(health_handler))
        .route("/doc", get(doc_handler))
        .with_state(state)
}
