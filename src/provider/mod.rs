//! Resource health providers.
//!
//! The polling engine talks to providers only through the `ProviderClient`
//! trait:
//! - `azure`: Azure Resource Manager `availabilityStatuses/current` API
//! - `testdata`: statuses served from a local JSON file

pub mod azure;
pub mod testdata;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub use azure::{AzureCredentials, AzureEndpoints, ClientSecretCredential, ResourceHealthClient};
pub use testdata::TestDataClient;

/// Availability status as reported by the provider, before normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAvailabilityStatus {
    #[serde(default)]
    pub availability_state: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub reason_type: Option<String>,
}

/// Errors returned by a provider for a single resource.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("failed to acquire access token: {0}")]
    Credential(String),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode provider response: {0}")]
    Decode(String),

    #[error("no status available for {0}")]
    NotFound(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("check cancelled")]
    Cancelled,
}

/// Source of raw availability statuses.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Fetches the current status of the resource with the given canonical
    /// identifier. Implementations should give up when `cancel` fires.
    async fn check_health(
        &self,
        resource_id: &str,
        cancel: CancellationToken,
    ) -> Result<RawAvailabilityStatus, ProviderError>;
}
