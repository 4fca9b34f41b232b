//! CLI arguments and subcommands for az-health-exporter.
//!
//! This module defines the command-line interface structure using the clap library,
//! including all flags, options, and subcommands.

use clap::{Parser, Subcommand, ValueEnum};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::config::Overrides;

pub const DEFAULT_PORT: u16 = 8080;

/// Log level options for CLI parsing
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// File format options for generated files
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "az-health-exporter",
    about = "Prometheus exporter for Azure Resource Health availability status",
    long_about = "Prometheus exporter for Azure Resource Health availability status.\n\n\
                  Periodically polls the Azure Resource Health API for a configured list of \
                  resources and exposes the results as Prometheus gauges and as a JSON \
                  status document.",
    version,
    propagate_version = true
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// HTTP listen port
    #[arg(short = 'p', long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Bind to specific interface/IP
    #[arg(long, default_value = "0.0.0.0")]
    pub bind: IpAddr,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,

    /// Resources file (YAML/JSON/TOML), overrides RESOURCES_CONFIG_FILE
    #[arg(short = 'r', long)]
    pub resources_file: Option<PathBuf>,

    /// Azure subscription, overrides AZURE_SUBSCRIPTION_ID
    #[arg(long)]
    pub subscription_id: Option<String>,

    /// Seconds between check cycles, overrides POLL_INTERVAL_SECONDS
    #[arg(long, allow_negative_numbers = true)]
    pub poll_interval: Option<i64>,

    /// Path to JSON test data file (serves statuses from the file instead of Azure)
    #[arg(short = 't', long)]
    pub test_data_file: Option<PathBuf>,

    /// Serve HTTPS instead of HTTP
    #[arg(long, requires_all = ["tls_cert", "tls_key"])]
    pub enable_tls: bool,

    /// TLS certificate (PEM)
    #[arg(long)]
    pub tls_cert: Option<PathBuf>,

    /// TLS private key (PEM)
    #[arg(long)]
    pub tls_key: Option<PathBuf>,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,
}

impl Args {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            subscription_id: self.subscription_id.clone(),
            resources_file: self.resources_file.clone(),
            poll_interval_seconds: self.poll_interval,
        }
    }
}

/// Subcommands for additional functionality
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate environment and resources file
    Check {
        /// Also verify that Azure credentials are present
        #[arg(long)]
        credentials: bool,
    },

    /// Generate a sample resources file
    Config {
        /// Output file path (stdout if omitted)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,

        /// Include comments and examples
        #[arg(long)]
        commented: bool,
    },

    /// List configured resources with their canonical identifiers
    Resources {
        /// Output format for the list
        #[arg(long, value_enum)]
        format: Option<ConfigFormat>,
    },

    /// Generate synthetic test data JSON file for the configured resources
    GenerateTestdata {
        /// Output file path
        #[arg(short = 'o', long, default_value = "testdata.json")]
        output: PathBuf,

        /// Share of resources reported as Available (0.0 - 1.0)
        #[arg(long, default_value_t = 0.7)]
        available_ratio: f64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["az-health-exporter"]);
        assert_eq!(args.port, DEFAULT_PORT);
        assert!(args.command.is_none());
        assert!(!args.enable_tls);
        assert!(args.overrides().poll_interval_seconds.is_none());
    }

    #[test]
    fn test_overrides_from_flags() {
        let args = Args::parse_from([
            "az-health-exporter",
            "-r",
            "resources.yaml",
            "--subscription-id",
            "sub-123",
            "--poll-interval",
            "-1",
        ]);
        let overrides = args.overrides();
        assert_eq!(overrides.subscription_id.as_deref(), Some("sub-123"));
        assert_eq!(overrides.resources_file, Some(PathBuf::from("resources.yaml")));
        assert_eq!(overrides.poll_interval_seconds, Some(-1));
    }

    #[test]
    fn test_tls_requires_cert_and_key() {
        assert!(Args::try_parse_from(["az-health-exporter", "--enable-tls"]).is_err());
        assert!(Args::try_parse_from([
            "az-health-exporter",
            "--enable-tls",
            "--tls-cert",
            "cert.pem",
            "--tls-key",
            "key.pem",
        ])
        .is_ok());
    }

    #[test]
    fn test_subcommand_parsing() {
        let args = Args::parse_from(["az-health-exporter", "config", "--format", "toml"]);
        assert!(matches!(
            args.command,
            Some(Commands::Config {
                format: ConfigFormat::Toml,
                commented: false,
                ..
            })
        ));
    }
}
