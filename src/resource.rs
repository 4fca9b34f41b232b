//! Monitored resource identity.
//!
//! A `ResourceDescriptor` combines the subscription the exporter runs against
//! with one entry from the resources file and derives the Azure Resource
//! Manager identifier used to query its health.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One entry of the `resources` list in the resources file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceEntry {
    pub resource_group: String,
    pub name: String,
    #[serde(rename = "type")]
    pub resource_type: String,
}

impl ResourceEntry {
    pub fn new(
        resource_group: impl Into<String>,
        name: impl Into<String>,
        resource_type: impl Into<String>,
    ) -> Self {
        Self {
            resource_group: resource_group.into(),
            name: name.into(),
            resource_type: resource_type.into(),
        }
    }
}

/// Immutable description of a single monitored resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDescriptor {
    subscription_id: String,
    entry: ResourceEntry,
}

impl ResourceDescriptor {
    pub fn new(subscription_id: impl Into<String>, entry: &ResourceEntry) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            entry: entry.clone(),
        }
    }

    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    pub fn resource_group(&self) -> &str {
        &self.entry.resource_group
    }

    pub fn name(&self) -> &str {
        &self.entry.name
    }

    pub fn resource_type(&self) -> &str {
        &self.entry.resource_type
    }

    /// Fully qualified ARM identifier of the resource.
    ///
    /// Always derived from the source fields; two descriptors built from the
    /// same inputs produce the same identifier.
    pub fn canonical_id(&self) -> String {
        format!(
            "/subscriptions/{}/resourceGroups/{}/providers/{}/{}",
            self.subscription_id,
            self.entry.resource_group,
            self.entry.resource_type,
            self.entry.name
        )
    }
}

impl fmt::Display for ResourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.entry.resource_group, self.entry.name)
    }
}
