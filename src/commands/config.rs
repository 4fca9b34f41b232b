//! Config command implementation.
//!
//! Writes a sample resources file in YAML, JSON or TOML.

use std::fs;
use std::path::PathBuf;
use tracing::debug;

use crate::cli::ConfigFormat;
use crate::config::ResourcesFile;
use crate::resource::ResourceEntry;

const YAML_HEADER: &str = "\
# az-health-exporter resources file
#
# Point RESOURCES_CONFIG_FILE (or --resources-file) at this file.
# Every entry needs the resource group, the resource name and the full
# resource type (provider namespace and type). The subscription comes from
# AZURE_SUBSCRIPTION_ID.
";

const TOML_HEADER: &str = "\
# az-health-exporter resources file
#
# Point RESOURCES_CONFIG_FILE (or --resources-file) at this file.
# The subscription comes from AZURE_SUBSCRIPTION_ID.
";

fn sample() -> ResourcesFile {
    ResourcesFile {
        resources: Some(vec![
            ResourceEntry::new("rg-production", "vm-web-01", "Microsoft.Compute/virtualMachines"),
            ResourceEntry::new("rg-production", "sql-main", "Microsoft.Sql/servers"),
            ResourceEntry::new("rg-shared", "kv-secrets", "Microsoft.KeyVault/vaults"),
        ]),
    }
}

/// Renders the sample resources file. JSON has no comment syntax, so
/// `commented` only affects YAML and TOML.
pub fn render_sample(
    format: ConfigFormat,
    commented: bool,
) -> anyhow::Result<String> {
    let sample = sample();
    let out = match format {
        ConfigFormat::Yaml => {
            let body = serde_yaml::to_string(&sample)?;
            if commented {
                format!("{YAML_HEADER}\n{body}")
            } else {
                body
            }
        }
        ConfigFormat::Json => serde_json::to_string_pretty(&sample)? + "\n",
        ConfigFormat::Toml => {
            let body = toml::to_string_pretty(&sample)?;
            if commented {
                format!("{TOML_HEADER}\n{body}")
            } else {
                body
            }
        }
    };
    Ok(out)
}

/// Generates a sample resources file.
pub fn command_config(
    output: Option<PathBuf>,
    format: ConfigFormat,
    commented: bool,
) -> anyhow::Result<()> {
    debug!("Generating sample resources file as {:?}", format);
    let content = render_sample(format, commented)?;

    match output {
        Some(path) => {
            fs::write(&path, content)?;
            println!("✅ Sample resources file written to {}", path.display());
        }
        None => print!("{content}"),
    }
    Ok(())
}
