//! Configuration loading for az-health-exporter.
//!
//! Settings come from environment variables (subscription, credentials,
//! poll interval) plus a resources file listing what to monitor. The
//! resources file may be YAML (default), JSON or TOML, chosen by extension.

use ahash::AHashSet as HashSet;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::monitor::{MonitorSettings, DEFAULT_REQUEST_TIMEOUT, MAX_POLL_INTERVAL};
use crate::provider::{AzureCredentials, AzureEndpoints};
use crate::resource::{ResourceDescriptor, ResourceEntry};

pub const ENV_SUBSCRIPTION_ID: &str = "AZURE_SUBSCRIPTION_ID";
pub const ENV_POLL_INTERVAL: &str = "POLL_INTERVAL_SECONDS";
pub const ENV_RESOURCES_FILE: &str = "RESOURCES_CONFIG_FILE";
pub const ENV_TENANT_ID: &str = "AZURE_TENANT_ID";
pub const ENV_CLIENT_ID: &str = "AZURE_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "AZURE_CLIENT_SECRET";
pub const ENV_REQUEST_TIMEOUT: &str = "REQUEST_TIMEOUT_SECONDS";
pub const ENV_AUTHORITY_HOST: &str = "AZURE_AUTHORITY_HOST";
pub const ENV_RESOURCE_MANAGER: &str = "AZURE_RESOURCE_MANAGER_ENDPOINT";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    MissingEnv(&'static str),

    #[error("invalid value '{value}' for {name}: {reason}")]
    InvalidEnv {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("AZURE_TENANT_ID, AZURE_CLIENT_ID and AZURE_CLIENT_SECRET must all be set")]
    MissingCredentials,

    #[error("resources config file does not exist: {}", .0.display())]
    ResourcesFileMissing(PathBuf),

    #[error("failed to read resources config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse resources config {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("invalid resource configuration: {0}")]
    Invalid(String),
}

/// Settings read from the process environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvConfig {
    pub subscription_id: Option<String>,
    /// Raw interval in seconds; zero or negative means "use the default".
    pub poll_interval_seconds: Option<i64>,
    pub resources_file: Option<PathBuf>,
    pub request_timeout_seconds: Option<u64>,
    pub credentials: Option<AzureCredentials>,
    pub endpoints: AzureEndpoints,
}

impl EnvConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads settings through `lookup`; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let poll_interval_seconds = get(ENV_POLL_INTERVAL)
            .map(|v| parse_env(ENV_POLL_INTERVAL, v))
            .transpose()?;
        let request_timeout_seconds = get(ENV_REQUEST_TIMEOUT)
            .map(|v| parse_env(ENV_REQUEST_TIMEOUT, v))
            .transpose()?;

        let credentials = match (
            get(ENV_TENANT_ID),
            get(ENV_CLIENT_ID),
            get(ENV_CLIENT_SECRET),
        ) {
            (Some(tenant_id), Some(client_id), Some(client_secret)) => Some(AzureCredentials {
                tenant_id,
                client_id,
                client_secret,
            }),
            _ => None,
        };

        let defaults = AzureEndpoints::default();
        let endpoints = AzureEndpoints {
            authority_host: get(ENV_AUTHORITY_HOST).unwrap_or(defaults.authority_host),
            resource_manager: get(ENV_RESOURCE_MANAGER).unwrap_or(defaults.resource_manager),
        };

        Ok(Self {
            subscription_id: get(ENV_SUBSCRIPTION_ID),
            poll_interval_seconds,
            resources_file: get(ENV_RESOURCES_FILE).map(PathBuf::from),
            request_timeout_seconds,
            credentials,
            endpoints,
        })
    }
}

fn parse_env<T>(name: &'static str, value: String) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::InvalidEnv {
        name,
        value,
        reason: e.to_string(),
    })
}

/// Maps a configured interval in seconds to the engine setting. Zero or
/// negative values are treated as unset.
pub fn poll_interval_from_seconds(seconds: Option<i64>) -> Option<Duration> {
    seconds
        .filter(|s| *s > 0)
        .map(|s| Duration::from_secs(s as u64))
}

/// Layout of the resources file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourcesFile {
    /// A missing or null list means no resources.
    #[serde(default)]
    pub resources: Option<Vec<ResourceEntry>>,
}

/// Loads the resource list from `path`, choosing the format by extension.
pub fn load_resources(path: &Path) -> Result<Vec<ResourceEntry>, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::ResourcesFileMissing(path.to_path_buf()));
    }

    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    if content.trim().is_empty() {
        info!("Resources file {} is empty", path.display());
        return Ok(Vec::new());
    }

    let parse_error = |message: String| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    };

    let parsed: Option<ResourcesFile> = match path.extension().and_then(|s| s.to_str()) {
        Some("json") => serde_json::from_str(&content).map_err(|e| parse_error(e.to_string()))?,
        Some("toml") => Some(toml::from_str(&content).map_err(|e| parse_error(e.to_string()))?),
        // Default to YAML
        _ => serde_yaml::from_str(&content).map_err(|e| parse_error(e.to_string()))?,
    };

    let resources = parsed.and_then(|f| f.resources).unwrap_or_default();
    info!(
        "Loaded {} resources from {}",
        resources.len(),
        path.display()
    );
    Ok(resources)
}

/// Rejects incomplete entries and entries that resolve to the same resource.
pub fn validate_resources(
    subscription_id: &str,
    entries: &[ResourceEntry],
) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for (index, entry) in entries.iter().enumerate() {
        for (field, value) in [
            ("resource_group", &entry.resource_group),
            ("name", &entry.name),
            ("type", &entry.resource_type),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "resource #{} is missing '{}'",
                    index + 1,
                    field
                )));
            }
        }

        let id = ResourceDescriptor::new(subscription_id, entry)
            .canonical_id()
            .to_ascii_lowercase();
        if !seen.insert(id) {
            return Err(ConfigError::Invalid(format!(
                "resource {}/{} is listed more than once",
                entry.resource_group, entry.name
            )));
        }
    }
    Ok(())
}

/// Values given on the command line that take precedence over the environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub subscription_id: Option<String>,
    pub resources_file: Option<PathBuf>,
    pub poll_interval_seconds: Option<i64>,
}

/// Effective monitoring configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub subscription_id: String,
    pub resources_file: PathBuf,
    pub resources: Vec<ResourceEntry>,
    pub poll_interval: Option<Duration>,
    pub request_timeout: Duration,
    pub credentials: Option<AzureCredentials>,
    pub endpoints: AzureEndpoints,
}

impl Config {
    /// Resolves configuration with precedence CLI > environment > defaults,
    /// then loads and validates the resources file.
    pub fn resolve(env: EnvConfig, overrides: &Overrides) -> Result<Self, ConfigError> {
        let subscription_id = overrides
            .subscription_id
            .clone()
            .or(env.subscription_id)
            .ok_or(ConfigError::MissingEnv(ENV_SUBSCRIPTION_ID))?;
        let resources_file = overrides
            .resources_file
            .clone()
            .or(env.resources_file)
            .ok_or(ConfigError::MissingEnv(ENV_RESOURCES_FILE))?;
        let poll_interval_seconds = overrides.poll_interval_seconds.or(env.poll_interval_seconds);
        if let Some(seconds) = poll_interval_seconds {
            if seconds > MAX_POLL_INTERVAL.as_secs() as i64 {
                return Err(ConfigError::InvalidEnv {
                    name: ENV_POLL_INTERVAL,
                    value: seconds.to_string(),
                    reason: format!("must not exceed {} seconds", MAX_POLL_INTERVAL.as_secs()),
                });
            }
        }
        let poll_interval = poll_interval_from_seconds(poll_interval_seconds);
        let request_timeout = env
            .request_timeout_seconds
            .filter(|s| *s > 0)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT);

        let resources = load_resources(&resources_file)?;
        validate_resources(&subscription_id, &resources)?;

        Ok(Self {
            subscription_id,
            resources_file,
            resources,
            poll_interval,
            request_timeout,
            credentials: env.credentials,
            endpoints: env.endpoints,
        })
    }

    pub fn descriptors(&self) -> Vec<ResourceDescriptor> {
        self.resources
            .iter()
            .map(|entry| ResourceDescriptor::new(self.subscription_id.as_str(), entry))
            .collect()
    }

    pub fn monitor_settings(&self) -> MonitorSettings {
        MonitorSettings {
            poll_interval: self.poll_interval,
            request_timeout: self.request_timeout,
        }
    }

    /// Credentials for the Azure provider, which are mandatory there.
    pub fn require_credentials(&self) -> Result<&AzureCredentials, ConfigError> {
        self.credentials
            .as_ref()
            .ok_or(ConfigError::MissingCredentials)
    }
}
