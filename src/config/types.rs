//! Core configuration types and loading.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use super::dispatch::DispatchConfig;
use super::flags::FlagConfig;
use super::limits::LimitsConfig;
use super::tokenizer::TokenizerConfig;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Dispatcher configuration. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Prefixes, name matching, owners.
    #[serde(default)]
    pub dispatch: DispatchConfig,
    /// Quote pairs and escape character.
    #[serde(default)]
    pub tokenizer: TokenizerConfig,
    /// Bucket retention and maintenance.
    #[serde(default)]
    pub limits: LimitsConfig,
    /// Default flag-group syntax.
    #[serde(default)]
    pub flags: FlagConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}
