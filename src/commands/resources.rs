//! Resources command implementation.

use serde::Serialize;

use crate::cli::ConfigFormat;
use crate::config::{Config, EnvConfig, Overrides};
use crate::resource::ResourceDescriptor;

#[derive(Debug, Serialize)]
struct ResourceListing {
    id: String,
    resource_group: String,
    name: String,
    #[serde(rename = "type")]
    resource_type: String,
}

impl From<&ResourceDescriptor> for ResourceListing {
    fn from(d: &ResourceDescriptor) -> Self {
        Self {
            id: d.canonical_id(),
            resource_group: d.resource_group().to_string(),
            name: d.name().to_string(),
            resource_type: d.resource_type().to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct Listing {
    resources: Vec<ResourceListing>,
}

/// Lists the configured resources with their canonical identifiers.
pub fn command_resources(
    env: EnvConfig,
    overrides: &Overrides,
    format: Option<ConfigFormat>,
) -> anyhow::Result<()> {
    let config = Config::resolve(env, overrides)?;
    let descriptors = config.descriptors();
    print!("{}", render_resources(&descriptors, format)?);
    Ok(())
}

fn render_resources(
    descriptors: &[ResourceDescriptor],
    format: Option<ConfigFormat>,
) -> anyhow::Result<String> {
    let listing = Listing {
        resources: descriptors.iter().map(ResourceListing::from).collect(),
    };

    let out = match format {
        None => {
            let mut out = String::new();
            for d in descriptors {
                out.push_str(&format!("{:<40} {}\n", d.to_string(), d.canonical_id()));
            }
            out.push_str(&format!("\n{} resources\n", descriptors.len()));
            out
        }
        Some(ConfigFormat::Yaml) => serde_yaml::to_string(&listing)?,
        Some(ConfigFormat::Json) => serde_json::to_string_pretty(&listing)? + "\n",
        Some(ConfigFormat::Toml) => toml::to_string_pretty(&listing)?,
    };
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::ResourceEntry;

    fn descriptors() -> Vec<ResourceDescriptor> {
        vec![ResourceDescriptor::new(
            "sub-123",
            &ResourceEntry::new("rg1", "vm1", "Microsoft.Compute/virtualMachines"),
        )]
    }

    #[test]
    fn test_render_plain() {
        let out = render_resources(&descriptors(), None).unwrap();
        assert!(out.starts_with("rg1/vm1"));
        assert!(out.contains(
            "/subscriptions/sub-123/resourceGroups/rg1/providers/Microsoft.Compute/virtualMachines/vm1"
        ));
        assert!(out.contains("1 resources"));
    }

    #[test]
    fn test_render_json() {
        let out = render_resources(&descriptors(), Some(ConfigFormat::Json)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["resources"][0]["type"], "Microsoft.Compute/virtualMachines");
        assert_eq!(value["resources"][0]["name"], "vm1");
    }
}
