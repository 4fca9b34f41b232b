//! Documentation endpoint handler.
//!
//! This module provides the `/doc` endpoint handler that displays
//! documentation for the exporter.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use tracing::{debug, instrument};

use crate::handlers::health::FOOTER_TEXT;
use crate::metrics::{HEALTH_STATUS_METRIC, LAST_CHECK_METRIC};
use crate::state::SharedState;

/// Handler for the /doc endpoint.
#[instrument(skip(state))]
pub async fn doc_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /doc request");

    let monitor = &state.monitor;
    let doc = format!(
        r#"AZURE RESOURCE HEALTH EXPORTER - DOCUMENTATION
==============================================

VERSION: {name}
DESCRIPTION: Prometheus exporter for Azure Resource Health availability status
MONITORED RESOURCES: {count}
POLL INTERVAL: {interval}s

HTTP ENDPOINTS
--------------
GET /metrics     - Prometheus metrics endpoint
GET /status      - Latest health record per resource (JSON)
GET /health      - Liveness check (JSON)
GET /doc         - This documentation (plain text)

AVAILABLE METRICS
-----------------
{status:<48} - 1 if Available, else 0
{last:<48} - Unix time of the last successful check

azure_health_exporter_check_cycles_total         - Completed check cycles
azure_health_exporter_check_failures_total       - Failed checks per resource
azure_health_exporter_check_cycle_duration_seconds - Duration of the last cycle
azure_health_exporter_resources_checked          - Resources checked in the last cycle

CONFIGURATION
-------------
Environment variables:
- AZURE_SUBSCRIPTION_ID: Subscription of the monitored resources (required)
- RESOURCES_CONFIG_FILE: Resources file, YAML/JSON/TOML (required)
- POLL_INTERVAL_SECONDS: Seconds between check cycles (default: 60)
- REQUEST_TIMEOUT_SECONDS: Timeout of a single check (default: 30)
- AZURE_TENANT_ID, AZURE_CLIENT_ID, AZURE_CLIENT_SECRET: Service principal
- AZURE_AUTHORITY_HOST, AZURE_RESOURCE_MANAGER_ENDPOINT: Sovereign clouds

Resources file:
resources:
  - resource_group: rg1
    name: vm1
    type: Microsoft.Compute/virtualMachines

CLI COMMANDS
------------
az-health-exporter                         - Start the exporter
az-health-exporter check                   - Validate environment and resources file
az-health-exporter config -o resources.yaml - Generate a sample resources file
az-health-exporter resources               - List canonical resource identifiers
az-health-exporter generate-testdata       - Write synthetic test data
az-health-exporter --help                  - Show all CLI options

EXAMPLE PROMQL QUERIES
----------------------
# Resources that are not available
{status} == 0

# Unhealthy resources per resource group
count by (resource_group) ({status} == 0)

# Resources not checked for 10 minutes
time() - {last} > 600

{footer}
"#,
        name = crate::informative_name(),
        count = monitor.resources().len(),
        interval = monitor.settings().effective_interval().as_secs(),
        status = HEALTH_STATUS_METRIC,
        last = LAST_CHECK_METRIC,
        footer = FOOTER_TEXT,
    );

    (
        StatusCode::OK,
        [("Content-Type", "text/plain; charset=utf-8")],
        doc,
    )
}
