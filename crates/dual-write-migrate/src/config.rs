//! Configuration loading and validation.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{DualWriteError, Result};
use crate::pattern::Pattern;
use crate::validate::ValidatorConfig;

/// Library configuration: the starting migration phase plus validator tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Migration phase the proxy starts in.
    #[serde(default = "default_pattern")]
    pub pattern: Pattern,

    /// Validator tuning.
    #[serde(default)]
    pub validator: ValidatorSettings,
}

/// Validator tuning as it appears in configuration files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorSettings {
    /// Page size for the target→base id scan.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Per-query deadline in seconds.
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,
}

fn default_pattern() -> Pattern {
    Pattern::SourceOnly
}

fn default_batch_size() -> usize {
    100
}

fn default_query_timeout_secs() -> u64 {
    30
}

impl Default for ValidatorSettings {
    fn default() -> Self {
        ValidatorSettings {
            batch_size: default_batch_size(),
            query_timeout_secs: default_query_timeout_secs(),
        }
    }
}

impl ValidatorSettings {
    /// Convert to the runtime validator configuration.
    pub fn to_validator_config(&self) -> ValidatorConfig {
        ValidatorConfig {
            batch_size: self.batch_size,
            query_timeout: Duration::from_secs(self.query_timeout_secs),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.validator.batch_size == 0 {
            return Err(DualWriteError::config(
                "validator.batch_size must be at least 1",
            ));
        }
        if self.validator.query_timeout_secs == 0 {
            return Err(DualWriteError::config(
                "validator.query_timeout_secs must be at least 1",
            ));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            pattern: default_pattern(),
            validator: ValidatorSettings::default(),
        }
    }
}
