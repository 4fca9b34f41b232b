//! az-health-exporter: Azure Resource Health monitoring for Prometheus.
//!
//! A [`monitor::HealthMonitor`] polls a [`provider::ProviderClient`] for the
//! availability status of every configured resource, keeps the latest
//! [`health::HealthRecord`] per resource in a [`store::HealthStore`] and
//! mirrors it into Prometheus gauges through a [`metrics::MetricsSink`].
//! The [`handlers`] module exposes the results over HTTP.

pub mod cli;
pub mod commands;
pub mod config;
pub mod handlers;
pub mod health;
pub mod metrics;
pub mod monitor;
pub mod provider;
pub mod resource;
pub mod state;
pub mod store;

pub use health::{AvailabilityState, HealthRecord};
pub use metrics::{HealthMetrics, MetricsSink};
pub use monitor::{CycleSummary, HealthMonitor, MonitorError, MonitorSettings, MonitorState};
pub use provider::{ProviderClient, ProviderError, RawAvailabilityStatus};
pub use resource::{ResourceDescriptor, ResourceEntry};
pub use store::HealthStore;

/// Name and version of this build, e.g. `az-health-exporter, 0.1.0-1a2b3c (2024-05-01)`.
///
/// The commit and release date are taken from `AZ_HEALTH_EXPORTER_COMMIT` and
/// `AZ_HEALTH_EXPORTER_RELEASE_DATE` at compile time when set.
pub fn informative_name() -> String {
    build_name(
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        option_env!("AZ_HEALTH_EXPORTER_COMMIT"),
        option_env!("AZ_HEALTH_EXPORTER_RELEASE_DATE"),
    )
}

fn build_name(name: &str, version: &str, commit: Option<&str>, date: Option<&str>) -> String {
    let mut out = format!("{name}, {version}");
    if let Some(commit) = commit.filter(|c| !c.is_empty()) {
        out.push('-');
        out.push_str(commit);
    }
    if let Some(date) = date.filter(|d| !d.is_empty()) {
        out.push_str(&format!(" ({date})"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_name() {
        assert_eq!(build_name("app", "1.2.3", None, None), "app, 1.2.3");
        assert_eq!(
            build_name("app", "1.2.3", Some("abc123"), Some("2024-05-01")),
            "app, 1.2.3-abc123 (2024-05-01)"
        );
        assert_eq!(build_name("app", "1.2.3", Some(""), None), "app, 1.2.3");
    }

    #[test]
    fn test_informative_name_has_version() {
        assert!(informative_name().starts_with("az-health-exporter, "));
        assert!(informative_name().contains(env!("CARGO_PKG_VERSION")));
    }
}
