//! Generate testdata command implementation.
//!
//! Generates synthetic test data JSON files for the configured resources.

use chrono::Utc;
use rand::Rng;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

use crate::health::AvailabilityState;
use crate::provider::testdata::{TestData, TestResourceStatus};
use crate::provider::RawAvailabilityStatus;
use crate::resource::ResourceDescriptor;

/// Builds test data with a random availability status for every resource.
/// Roughly `available_ratio` of the resources are reported as Available.
pub fn generate_test_data(
    rng: &mut impl Rng,
    descriptors: &[ResourceDescriptor],
    available_ratio: f64,
) -> TestData {
    let ratio = available_ratio.clamp(0.0, 1.0);
    let resources = descriptors
        .iter()
        .map(|d| TestResourceStatus {
            resource_id: d.canonical_id(),
            status: generate_random_status(&mut *rng, ratio),
        })
        .collect();

    TestData {
        version: "1.0".to_string(),
        generated_at: Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        resources,
    }
}

/// Generates synthetic test data JSON file for testing purposes.
pub fn command_generate_testdata(
    output: PathBuf,
    available_ratio: f64,
    descriptors: &[ResourceDescriptor],
) -> anyhow::Result<()> {
    debug!(
        "Generating test data: available_ratio={}, resources={}, output={}",
        available_ratio,
        descriptors.len(),
        output.display()
    );

    let mut rng = rand::thread_rng();
    let test_data = generate_test_data(&mut rng, descriptors, available_ratio);

    // Write to file as pretty-printed JSON
    let json_content = serde_json::to_string_pretty(&test_data)?;
    fs::write(&output, &json_content)?;

    println!(
        "✅ Generated test data: {} resources in {}",
        test_data.resources.len(),
        output.display()
    );

    Ok(())
}

fn generate_random_status(rng: &mut impl Rng, available_ratio: f64) -> RawAvailabilityStatus {
    if rng.gen_bool(available_ratio) {
        return RawAvailabilityStatus {
            availability_state: Some(AvailabilityState::Available.as_str().to_string()),
            summary: Some("There aren't any known Azure platform problems affecting this resource.".into()),
            reason_type: None,
        };
    }

    let (state, summary, reason) = match rng.gen_range(0..3) {
        0 => (
            AvailabilityState::Degraded,
            "We're sorry, your resource is running with reduced performance.",
            "Unplanned",
        ),
        1 => (
            AvailabilityState::Unavailable,
            "We're sorry, your resource is unavailable because of a platform problem.",
            "Unplanned",
        ),
        _ => (
            AvailabilityState::Unknown,
            "We are currently unable to determine the health of this resource.",
            "",
        ),
    };

    RawAvailabilityStatus {
        availability_state: Some(state.as_str().to_string()),
        summary: Some(summary.to_string()),
        reason_type: (!reason.is_empty()).then(|| reason.to_string()),
    }
}
