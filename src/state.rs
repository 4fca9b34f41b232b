//! Application state management for the exporter.
//!
//! This module defines the shared application state that is passed
//! to HTTP handlers.

use chrono::{DateTime, Utc};
use prometheus::Registry;
use std::sync::Arc;

use crate::monitor::HealthMonitor;

/// Type alias for shared application state.
pub type SharedState = Arc<AppState>;

/// Global application state shared across requests and the monitor task.
pub struct AppState {
    pub registry: Registry,
    pub monitor: Arc<HealthMonitor>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(registry: Registry, monitor: Arc<HealthMonitor>) -> Self {
        Self {
            registry,
            monitor,
            started_at: Utc::now(),
        }
    }
}
