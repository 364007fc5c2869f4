use config::{Config, Environment, File};
use metastore_core::records::{StatisticsConfig, TimeTravelFormat};
use serde::Deserialize;
use std::path::Path;

use crate::error::Result;

/// Engine settings: which feature store to work in and creation defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreSettings {
    #[serde(default)]
    pub feature_store: FeatureStoreSettings,
    #[serde(default)]
    pub defaults: DefaultSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeatureStoreSettings {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DefaultSettings {
    #[serde(default)]
    pub time_travel_format: TimeTravelFormat,
    #[serde(default)]
    pub statistics: StatisticsConfig,
}

impl StoreSettings {
    /// Loads settings from `config/` and `FEATURESTORE_` variables.
    pub fn new() -> Result<Self> {
        let config_dir = Path::new("config");

        let builder = Config::builder()
            // Start with default settings
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Add local overrides
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            // Add environment variables with prefix FEATURESTORE_
            .add_source(Environment::with_prefix("FEATURESTORE").prefix_separator("_").separator("__"));

        Ok(builder.build()?.try_deserialize()?)
    }
}

impl Default for FeatureStoreSettings {
    fn default() -> Self {
        Self {
            id: 1,
            name: "featurestore".to_string(),
        }
    }
}

impl Default for DefaultSettings {
    fn default() -> Self {
        Self {
            time_travel_format: TimeTravelFormat::Hudi,
            statistics: StatisticsConfig::default(),
        }
    }
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            feature_store: FeatureStoreSettings::default(),
            defaults: DefaultSettings::default(),
        }
    }
}
