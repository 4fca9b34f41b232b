//! Test data provider.
//!
//! Serves availability statuses from a JSON file instead of Azure, so the
//! exporter can be run and scraped without credentials.

use ahash::AHashMap as HashMap;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{ProviderClient, ProviderError, RawAvailabilityStatus};

/// Status entry of one resource in a test data file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResourceStatus {
    pub resource_id: String,
    #[serde(flatten)]
    pub status: RawAvailabilityStatus,
}

/// Root structure for test data JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestData {
    pub version: String,
    pub generated_at: String,
    pub resources: Vec<TestResourceStatus>,
}

/// Load test data from JSON file.
pub fn load_test_data_from_file(path: &Path) -> Result<TestData, String> {
    debug!("Loading test data from: {}", path.display());

    if !path.exists() {
        return Err(format!("Test data file not found: {}", path.display()));
    }

    let content =
        fs::read_to_string(path).map_err(|e| format!("Failed to read test data file: {}", e))?;
    let test_data: TestData = serde_json::from_str(&content)
        .map_err(|e| format!("Failed to parse test data JSON: {}", e))?;

    info!(
        "Loaded test data version {} from {} ({} resources)",
        test_data.version,
        test_data.generated_at,
        test_data.resources.len()
    );

    Ok(test_data)
}

/// Provider answering from a fixed set of statuses.
pub struct TestDataClient {
    statuses: HashMap<String, RawAvailabilityStatus>,
}

impl TestDataClient {
    pub fn new(test_data: TestData) -> Self {
        let statuses = test_data
            .resources
            .into_iter()
            .map(|r| (r.resource_id.to_ascii_lowercase(), r.status))
            .collect();
        Self { statuses }
    }

    pub fn from_file(path: &Path) -> Result<Self, String> {
        load_test_data_from_file(path).map(Self::new)
    }
}

#[async_trait]
impl ProviderClient for TestDataClient {
    async fn check_health(
        &self,
        resource_id: &str,
        cancel: CancellationToken,
    ) -> Result<RawAvailabilityStatus, ProviderError> {
        if cancel.is_cancelled() {
            return Err(ProviderError::Cancelled);
        }
        // ARM identifiers are case-insensitive.
        self.statuses
            .get(&resource_id.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(resource_id.to_string()))
    }
}
