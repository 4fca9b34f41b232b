//! CLI command implementations for az-health-exporter.
//!
//! This module provides implementations for all CLI subcommands:
//! - `check`: Environment and resources file validation
//! - `config`: Sample resources file generation
//! - `resources`: Resource listing
//! - `generate`: Test data generation

pub mod check;
pub mod config;
pub mod generate;
pub mod resources;

// Re-export command functions
pub use check::command_check;
pub use config::command_config;
pub use generate::command_generate_testdata;
pub use resources::command_resources;

use anyhow::Context;

use crate::cli::Commands;
use crate::config::{Config, ConfigError, EnvConfig, Overrides};

/// Runs a subcommand. `env` is only consulted by subcommands that read the
/// monitoring configuration.
pub fn run<F>(command: &Commands, overrides: &Overrides, env: F) -> anyhow::Result<()>
where
    F: Fn() -> Result<EnvConfig, ConfigError>,
{
    let env = || env().context("invalid environment");

    match command {
        Commands::Check { credentials } => {
            command_check(env()?, overrides, *credentials).context("configuration invalid")
        }
        Commands::Config {
            output,
            format,
            commented,
        } => command_config(output.clone(), *format, *commented),
        Commands::Resources { format } => command_resources(env()?, overrides, *format),
        Commands::GenerateTestdata {
            output,
            available_ratio,
        } => {
            let config = Config::resolve(env()?, overrides)?;
            command_generate_testdata(output.clone(), *available_ratio, &config.descriptors())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::ConfigFormat;
    use crate::config::ENV_POLL_INTERVAL;

    fn broken_env() -> Result<EnvConfig, ConfigError> {
        Err(ConfigError::InvalidEnv {
            name: ENV_POLL_INTERVAL,
            value: "soon".into(),
            reason: "invalid digit found in string".into(),
        })
    }

    #[test]
    fn test_config_ignores_environment() {
        let file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        let command = Commands::Config {
            output: Some(file.path().to_path_buf()),
            format: ConfigFormat::Yaml,
            commented: false,
        };

        run(&command, &Overrides::default(), broken_env).unwrap();
        assert_eq!(crate::config::load_resources(file.path()).unwrap().len(), 3);
    }

    #[test]
    fn test_resources_reports_environment_error() {
        let command = Commands::Resources { format: None };
        let err = run(&command, &Overrides::default(), broken_env).unwrap_err();
        assert!(format!("{err:#}").contains(ENV_POLL_INTERVAL));
    }
}
