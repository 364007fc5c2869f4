//! Configuration management for feature store collaborators.
//!
//! This module provides configuration handling through multiple sources:
//! 1. Default configuration (embedded in binary)
//! 2. System-wide configuration file (`/etc/featurestore/config.toml`)
//! 3. User-specified configuration file
//! 4. Environment variables (prefixed with `FEATURESTORE_`)
//! 5. Command-line arguments
//!
//! Configuration options are loaded in order of precedence, with later sources
//! overriding earlier ones.
//!
//! # Environment Variables
//!
//! Gateway credentials should be provided via environment variables:
//! - `FEATURESTORE_GATEWAY_USERNAME` - Metadata gateway username
//! - `FEATURESTORE_GATEWAY_PASSWORD` - Metadata gateway password

use clap::Parser;
use config::{Config, ConfigError};
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");
const DEFAULT_CONFIG_PATH: &str = "/etc/featurestore/config.toml";

/// Command-line arguments parser.
///
/// Every option can also be supplied through its `FEATURESTORE_` environment
/// variable.
#[derive(Parser, Debug, Default)]
#[command(author, version, about)]
pub struct CliArgs {
    /// Path to the configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Metadata gateway type
    #[arg(long, env = "FEATURESTORE_GATEWAY_ENGINE")]
    pub gateway: Option<String>,

    /// Metadata gateway connection string
    #[arg(long, env = "FEATURESTORE_GATEWAY_CONNECTION")]
    pub gateway_connection: Option<String>,

    /// Metadata gateway options (key=value pairs)
    #[arg(long, env = "FEATURESTORE_GATEWAY_OPTIONS", value_delimiter = ',')]
    pub gateway_options: Option<Vec<String>>,

    /// Materialization provider type
    #[arg(long, env = "FEATURESTORE_PROVIDER_ENGINE")]
    pub provider: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "FEATURESTORE_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Metadata gateway username
    #[arg(long, env = "FEATURESTORE_GATEWAY_USERNAME")]
    pub gateway_username: Option<String>,

    /// Metadata gateway password
    #[arg(long, env = "FEATURESTORE_GATEWAY_PASSWORD")]
    pub gateway_password: Option<String>,
}

/// Complete collaborator configuration.
#[derive(Debug, Deserialize)]
pub struct Settings {
    /// Metadata gateway configuration
    pub gateway: GatewayConfig,
    /// Materialization provider configuration
    pub provider: ProviderConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Metadata gateway configuration.
#[derive(Debug, Deserialize)]
pub struct GatewayConfig {
    /// Gateway type ("memory")
    pub engine: String,
    /// Connection string for the gateway
    pub connection: String,
    /// Gateway-specific options
    #[serde(default)]
    pub options: HashMap<String, String>,
    /// Authentication credentials (not serialized)
    #[serde(skip)]
    pub credentials: Option<Credentials>,
}

/// Materialization provider configuration.
#[derive(Debug, Deserialize)]
pub struct ProviderConfig {
    /// Provider type ("arrow")
    pub engine: String,
}

#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

/// Authentication credentials for the metadata gateway.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Settings {
    /// Loads configuration from all available sources.
    pub fn new(cli: CliArgs) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        // Load default configuration
        builder = builder.add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml));

        // Load system configuration if it exists
        if let Ok(metadata) = std::fs::metadata(DEFAULT_CONFIG_PATH) {
            if metadata.is_file() {
                builder = builder.add_source(config::File::from(PathBuf::from(DEFAULT_CONFIG_PATH)));
            }
        }

        // Load user configuration if specified
        if let Some(ref config_path) = cli.config {
            builder = builder.add_source(config::File::from(config_path.clone()));
        }

        // Add environment variables (FEATURESTORE_GATEWAY__ENGINE sets gateway.engine)
        builder = builder.add_source(
            config::Environment::with_prefix("FEATURESTORE")
                .prefix_separator("_")
                .separator("__"),
        );

        // Override with command line arguments
        if let Some(ref gateway) = cli.gateway {
            builder = builder.set_override("gateway.engine", gateway.as_str())?;
        }
        if let Some(ref connection) = cli.gateway_connection {
            builder = builder.set_override("gateway.connection", connection.as_str())?;
        }
        if let Some(ref options) = cli.gateway_options {
            builder = builder.set_override("gateway.options", parse_options(options))?;
        }
        if let Some(ref provider) = cli.provider {
            builder = builder.set_override("provider.engine", provider.as_str())?;
        }
        if let Some(ref level) = cli.log_level {
            builder = builder.set_override("logging.level", level.as_str())?;
        }

        let mut settings: Settings = builder.build()?.try_deserialize()?;
        settings.gateway.credentials = Self::load_gateway_credentials(&cli);

        Ok(settings)
    }

    /// Load gateway credentials.
    /// Priority order (highest to lowest):
    /// 1. Environment variables
    /// 2. Command line arguments
    fn load_gateway_credentials(cli: &CliArgs) -> Option<Credentials> {
        if let (Some(username), Some(password)) = (
            env::var("FEATURESTORE_GATEWAY_USERNAME").ok(),
            env::var("FEATURESTORE_GATEWAY_PASSWORD").ok(),
        ) {
            return Some(Credentials { username, password });
        }

        if let (Some(username), Some(password)) = (&cli.gateway_username, &cli.gateway_password) {
            return Some(Credentials {
                username: username.clone(),
                password: password.clone(),
            });
        }

        None
    }
}

/// Parses `key=value` pairs, skipping malformed entries.
pub fn parse_options(options: &[String]) -> HashMap<String, String> {
    options
        .iter()
        .filter_map(|opt| {
            let (key, value) = opt.split_once('=')?;
            let key = key.trim();
            if key.is_empty() {
                None
            } else {
                Some((key.to_string(), value.trim().to_string()))
            }
        })
        .collect()
}
