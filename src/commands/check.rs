//! Check command implementation.
//!
//! Validates the environment and the resources file without starting the
//! exporter.

use tracing::debug;

use crate::config::{Config, ConfigError, EnvConfig, Overrides};

/// Validates configuration and prints the resources that would be monitored.
pub fn command_check(
    env: EnvConfig,
    overrides: &Overrides,
    check_credentials: bool,
) -> Result<(), ConfigError> {
    debug!("Running configuration check");

    let config = Config::resolve(env, overrides)?;
    println!("✅ Subscription: {}", config.subscription_id);
    println!(
        "✅ Resources file: {} ({} resources)",
        config.resources_file.display(),
        config.resources.len()
    );
    match config.poll_interval {
        Some(interval) => println!("✅ Poll interval: {}s", interval.as_secs()),
        None => println!(
            "✅ Poll interval: {}s (default)",
            config.monitor_settings().effective_interval().as_secs()
        ),
    }
    println!("✅ Request timeout: {}s", config.request_timeout.as_secs());

    if check_credentials {
        let credentials = config.require_credentials()?;
        println!(
            "✅ Credentials: tenant {} / client {}",
            credentials.tenant_id, credentials.client_id
        );
    } else if config.credentials.is_none() {
        println!("⚠️  Azure credentials not set (only test data mode will work)");
    }

    for descriptor in config.descriptors() {
        println!("   {}", descriptor.canonical_id());
    }

    println!("\n✅ Configuration is valid");
    Ok(())
}
