//! Normalized health records.
//!
//! This module maps the raw availability status returned by the provider into
//! the `HealthRecord` that is stored, exported as metrics and served on
//! `/status`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::provider::RawAvailabilityStatus;
use crate::resource::ResourceDescriptor;

/// Availability state reported by Azure Resource Health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AvailabilityState {
    Available,
    Degraded,
    Unavailable,
    #[default]
    Unknown,
}

impl AvailabilityState {
    pub const ALL: [AvailabilityState; 4] = [
        AvailabilityState::Available,
        AvailabilityState::Degraded,
        AvailabilityState::Unavailable,
        AvailabilityState::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AvailabilityState::Available => "Available",
            AvailabilityState::Degraded => "Degraded",
            AvailabilityState::Unavailable => "Unavailable",
            AvailabilityState::Unknown => "Unknown",
        }
    }

    /// Maps an optional provider value, falling back to `Unknown` when the
    /// provider omits the state or reports a value not known yet.
    pub fn from_provider(value: Option<&str>) -> Self {
        match value {
            Some(v) => v.parse().unwrap_or_default(),
            None => AvailabilityState::Unknown,
        }
    }
}

impl FromStr for AvailabilityState {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let state = AvailabilityState::ALL
            .into_iter()
            .find(|state| state.as_str().eq_ignore_ascii_case(s.trim()))
            .unwrap_or_else(|| {
                debug!("Unrecognized availability state '{}', using Unknown", s);
                AvailabilityState::Unknown
            });
        Ok(state)
    }
}

impl fmt::Display for AvailabilityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for AvailabilityState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for AvailabilityState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(AvailabilityState::from_provider(Some(&raw)))
    }
}

/// Last observed health of one resource.
///
/// There is no stored `healthy` flag: it is always derived from
/// `availability_state` via [`HealthRecord::healthy`].
#[derive(Debug, Clone, PartialEq)]
pub struct HealthRecord {
    pub id: String,
    pub name: String,
    pub resource_type: String,
    pub resource_group: String,
    pub availability_state: AvailabilityState,
    pub summary: String,
    pub reason_type: String,
    pub last_updated: DateTime<Utc>,
}

impl HealthRecord {
    /// Builds a record from a provider response observed at `observed_at`.
    pub fn from_status(
        resource: &ResourceDescriptor,
        status: RawAvailabilityStatus,
        observed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: resource.canonical_id(),
            name: resource.name().to_string(),
            resource_type: resource.resource_type().to_string(),
            resource_group: resource.resource_group().to_string(),
            availability_state: AvailabilityState::from_provider(
                status.availability_state.as_deref(),
            ),
            summary: status.summary.unwrap_or_default(),
            reason_type: status.reason_type.unwrap_or_default(),
            last_updated: observed_at,
        }
    }

    pub fn healthy(&self) -> bool {
        self.availability_state == AvailabilityState::Available
    }

    /// Observation time as Unix seconds.
    pub fn last_updated_unix(&self) -> f64 {
        self.last_updated.timestamp() as f64
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthRecordJson<'a> {
    id: &'a str,
    name: &'a str,
    #[serde(rename = "type")]
    resource_type: &'a str,
    resource_group: &'a str,
    availability_state: AvailabilityState,
    #[serde(skip_serializing_if = "str::is_empty")]
    summary: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    reason_type: &'a str,
    last_updated: DateTime<Utc>,
    healthy: bool,
}

impl Serialize for HealthRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        HealthRecordJson {
            id: &self.id,
            name: &self.name,
            resource_type: &self.resource_type,
            resource_group: &self.resource_group,
            availability_state: self.availability_state,
            summary: &self.summary,
            reason_type: &self.reason_type,
            last_updated: self.last_updated,
            healthy: self.healthy(),
        }
        .serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::ResourceEntry;
    use chrono::TimeZone;

    fn descriptor() -> ResourceDescriptor {
        ResourceDescriptor::new(
            "sub-123",
            &ResourceEntry::new("rg1", "vm1", "Microsoft.Compute/virtualMachines"),
        )
    }

    fn status(state: Option<&str>) -> RawAvailabilityStatus {
        RawAvailabilityStatus {
            availability_state: state.map(str::to_string),
            summary: Some("Your virtual machine is running".into()),
            reason_type: None,
        }
    }

    #[test]
    fn test_parse_availability_state() {
        let parse = |s: &str| s.parse::<AvailabilityState>().unwrap();
        assert_eq!(parse("Available"), AvailabilityState::Available);
        assert_eq!(parse("degraded"), AvailabilityState::Degraded);
        assert_eq!(parse(" Unavailable "), AvailabilityState::Unavailable);
        assert_eq!(parse("Rebooting"), AvailabilityState::Unknown);
        assert_eq!(AvailabilityState::from_provider(None), AvailabilityState::Unknown);
    }

    #[test]
    fn test_healthy_is_derived_from_state() {
        for state in AvailabilityState::ALL {
            let record =
                HealthRecord::from_status(&descriptor(), status(Some(state.as_str())), Utc::now());
            assert_eq!(record.availability_state, state);
            assert_eq!(record.healthy(), state == AvailabilityState::Available);
        }
    }

    #[test]
    fn test_missing_state_defaults_to_unknown() {
        let record = HealthRecord::from_status(&descriptor(), status(None), Utc::now());
        assert_eq!(record.availability_state, AvailabilityState::Unknown);
        assert!(!record.healthy());
        assert_eq!(record.reason_type, "");
    }

    #[test]
    fn test_record_fields_from_descriptor() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let record = HealthRecord::from_status(&descriptor(), status(Some("Available")), at);
        assert_eq!(record.id, descriptor().canonical_id());
        assert_eq!(record.name, "vm1");
        assert_eq!(record.resource_group, "rg1");
        assert_eq!(record.resource_type, "Microsoft.Compute/virtualMachines");
        assert_eq!(record.last_updated_unix(), 1_714_564_800.0);
    }

    #[test]
    fn test_json_shape() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let record = HealthRecord::from_status(&descriptor(), status(Some("Degraded")), at);
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["availabilityState"], "Degraded");
        assert_eq!(json["healthy"], false);
        assert_eq!(json["type"], "Microsoft.Compute/virtualMachines");
        assert_eq!(json["resourceGroup"], "rg1");
        assert_eq!(json["summary"], "Your virtual machine is running");
        assert!(json.get("reasonType").is_none());
        assert_eq!(json["lastUpdated"], "2024-05-01T12:00:00Z");
    }
}
