//! Prometheus metrics definitions for az-health-exporter.
//!
//! This module defines the `MetricsSink` seam used by the polling engine and
//! its Prometheus implementation, which exports per-resource health gauges
//! plus a few gauges/counters about the exporter's own check cycles.

use ahash::AHashMap as HashMap;
use prometheus::{Gauge, GaugeVec, IntCounter, IntCounterVec, Opts, Registry};
use std::sync::{Mutex, PoisonError};
use tracing::debug;

use crate::health::{AvailabilityState, HealthRecord};
use crate::monitor::CycleSummary;
use crate::resource::ResourceDescriptor;

pub const HEALTH_STATUS_METRIC: &str = "azure_resource_health_status";
pub const LAST_CHECK_METRIC: &str = "azure_resource_health_last_check_timestamp";

const STATUS_LABELS: &[&str] = &[
    "resource_id",
    "resource_group",
    "resource_name",
    "resource_type",
    "availability_state",
];
const LAST_CHECK_LABELS: &[&str] = &["resource_id", "resource_group", "resource_name"];

/// Receiver of health records and check outcomes from the polling engine.
pub trait MetricsSink: Send + Sync {
    /// Publishes the latest record of one resource.
    fn record(&self, record: &HealthRecord);

    /// Called when checking `resource` failed; its last record stays in place.
    fn record_failure(&self, _resource: &ResourceDescriptor) {}

    /// Called once a check cycle has finished or was cancelled.
    fn record_cycle(&self, _summary: &CycleSummary) {}
}

/// Prometheus gauges for resource health and exporter telemetry.
pub struct HealthMetrics {
    pub health_status: GaugeVec,
    pub last_check: GaugeVec,

    // Exporter telemetry
    pub check_cycles: IntCounter,
    pub check_failures: IntCounterVec,
    pub cycle_duration: Gauge,
    pub resources_checked: Gauge,

    /// Availability state currently exported per resource id. Also serializes
    /// updates so both families change together.
    exported_states: Mutex<HashMap<String, AvailabilityState>>,
}

impl HealthMetrics {
    /// Creates and registers all metrics with the registry.
    pub fn new(registry: &Registry) -> prometheus::Result<Self> {
        let health_status = GaugeVec::new(
            Opts::new(
                HEALTH_STATUS_METRIC,
                "Azure resource health status (1 = healthy, 0 = unhealthy)",
            ),
            STATUS_LABELS,
        )?;
        let last_check = GaugeVec::new(
            Opts::new(
                LAST_CHECK_METRIC,
                "Unix timestamp of the last successful health check",
            ),
            LAST_CHECK_LABELS,
        )?;

        let check_cycles = IntCounter::new(
            "azure_health_exporter_check_cycles_total",
            "Number of completed or cancelled check cycles",
        )?;
        let check_failures = IntCounterVec::new(
            Opts::new(
                "azure_health_exporter_check_failures_total",
                "Number of failed health checks per resource",
            ),
            &["resource_id", "resource_name"],
        )?;
        let cycle_duration = Gauge::new(
            "azure_health_exporter_check_cycle_duration_seconds",
            "Duration of the last check cycle in seconds",
        )?;
        let resources_checked = Gauge::new(
            "azure_health_exporter_resources_checked",
            "Number of resources successfully checked in the last cycle",
        )?;

        registry.register(Box::new(health_status.clone()))?;
        registry.register(Box::new(last_check.clone()))?;
        registry.register(Box::new(check_cycles.clone()))?;
        registry.register(Box::new(check_failures.clone()))?;
        registry.register(Box::new(cycle_duration.clone()))?;
        registry.register(Box::new(resources_checked.clone()))?;

        Ok(Self {
            health_status,
            last_check,
            check_cycles,
            check_failures,
            cycle_duration,
            resources_checked,
            exported_states: Mutex::new(HashMap::new()),
        })
    }
}

impl MetricsSink for HealthMetrics {
    fn record(&self, record: &HealthRecord) {
        let mut exported = self
            .exported_states
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        // Keep one status series per resource: drop the series carrying the
        // previously exported state label.
        if let Some(previous) = exported.insert(record.id.clone(), record.availability_state) {
            if previous != record.availability_state {
                let _ = self.health_status.remove_label_values(&[
                    record.id.as_str(),
                    record.resource_group.as_str(),
                    record.name.as_str(),
                    record.resource_type.as_str(),
                    previous.as_str(),
                ]);
                debug!(
                    "Availability of {} changed: {} -> {}",
                    record.name, previous, record.availability_state
                );
            }
        }

        let health_value = if record.healthy() { 1.0 } else { 0.0 };
        self.health_status
            .with_label_values(&[
                record.id.as_str(),
                record.resource_group.as_str(),
                record.name.as_str(),
                record.resource_type.as_str(),
                record.availability_state.as_str(),
            ])
            .set(health_value);

        self.last_check
            .with_label_values(&[
                record.id.as_str(),
                record.resource_group.as_str(),
                record.name.as_str(),
            ])
            .set(record.last_updated_unix());
    }

    fn record_failure(&self, resource: &ResourceDescriptor) {
        self.check_failures
            .with_label_values(&[resource.canonical_id().as_str(), resource.name()])
            .inc();
    }

    fn record_cycle(&self, summary: &CycleSummary) {
        self.check_cycles.inc();
        self.cycle_duration.set(summary.duration.as_secs_f64());
        self.resources_checked.set(summary.checked as f64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::ResourceEntry;
    use chrono::{TimeZone, Utc};
    use std::time::Duration;

    fn record(name: &str, state: AvailabilityState) -> HealthRecord {
        HealthRecord {
            id: format!(
                "/subscriptions/sub-123/resourceGroups/rg1/providers/Microsoft.Compute/virtualMachines/{name}"
            ),
            name: name.to_string(),
            resource_type: "Microsoft.Compute/virtualMachines".to_string(),
            resource_group: "rg1".to_string(),
            availability_state: state,
            summary: String::new(),
            reason_type: String::new(),
            last_updated: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        }
    }

    fn status_value(metrics: &HealthMetrics, r: &HealthRecord) -> f64 {
        metrics
            .health_status
            .with_label_values(&[
                r.id.as_str(),
                "rg1",
                r.name.as_str(),
                "Microsoft.Compute/virtualMachines",
                r.availability_state.as_str(),
            ])
            .get()
    }

    fn series_count(registry: &Registry, name: &str) -> usize {
        registry
            .gather()
            .iter()
            .find(|family| family.get_name() == name)
            .map(|family| family.get_metric().len())
            .unwrap_or(0)
    }

    #[test]
    fn test_record_sets_both_families() {
        let registry = Registry::new();
        let metrics = HealthMetrics::new(&registry).unwrap();

        let vm1 = record("vm1", AvailabilityState::Available);
        let vm2 = record("vm2", AvailabilityState::Degraded);
        metrics.record(&vm1);
        metrics.record(&vm2);

        assert_eq!(status_value(&metrics, &vm1), 1.0);
        assert_eq!(status_value(&metrics, &vm2), 0.0);
        assert_eq!(
            metrics
                .last_check
                .with_label_values(&[vm1.id.as_str(), "rg1", "vm1"])
                .get(),
            1_714_564_800.0
        );
        assert_eq!(series_count(&registry, HEALTH_STATUS_METRIC), 2);
        assert_eq!(series_count(&registry, LAST_CHECK_METRIC), 2);
    }

    #[test]
    fn test_record_is_idempotent() {
        let registry = Registry::new();
        let metrics = HealthMetrics::new(&registry).unwrap();
        let vm1 = record("vm1", AvailabilityState::Unavailable);

        metrics.record(&vm1);
        metrics.record(&vm1);

        assert_eq!(status_value(&metrics, &vm1), 0.0);
        assert_eq!(series_count(&registry, HEALTH_STATUS_METRIC), 1);
    }

    #[test]
    fn test_state_change_replaces_series() {
        let registry = Registry::new();
        let metrics = HealthMetrics::new(&registry).unwrap();

        metrics.record(&record("vm1", AvailabilityState::Degraded));
        let recovered = record("vm1", AvailabilityState::Available);
        metrics.record(&recovered);

        assert_eq!(series_count(&registry, HEALTH_STATUS_METRIC), 1);
        assert_eq!(status_value(&metrics, &recovered), 1.0);
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let registry = Registry::new();
        HealthMetrics::new(&registry).unwrap();
        assert!(HealthMetrics::new(&registry).is_err());
    }

    #[test]
    fn test_failure_and_cycle_telemetry() {
        let registry = Registry::new();
        let metrics = HealthMetrics::new(&registry).unwrap();
        let vm = ResourceDescriptor::new(
            "sub-123",
            &ResourceEntry::new("rg1", "vm1", "Microsoft.Compute/virtualMachines"),
        );

        metrics.record_failure(&vm);
        metrics.record_failure(&vm);
        metrics.record_cycle(&CycleSummary {
            checked: 3,
            failed: 2,
            skipped: 0,
            duration: Duration::from_millis(1500),
        });

        assert_eq!(
            metrics
                .check_failures
                .with_label_values(&[vm.canonical_id().as_str(), "vm1"])
                .get(),
            2
        );
        assert_eq!(metrics.check_cycles.get(), 1);
        assert_eq!(metrics.cycle_duration.get(), 1.5);
        assert_eq!(metrics.resources_checked.get(), 3.0);
    }
}
