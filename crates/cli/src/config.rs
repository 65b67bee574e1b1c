//! Configuration management for the CLI

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// CLI settings, read from `~/.config/falconeye/config.json`
///
/// Every field is optional; command-line flags and environment variables
/// take precedence.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Default score channel for statistical detection
    pub score_channel: Option<String>,
    /// Default sensitivity multiplier
    pub k: Option<f64>,
    /// Default feature channels for the multivariate detector
    pub feature_channels: Option<Vec<String>>,
    /// Default contamination for the multivariate detector
    pub contamination: Option<f64>,
    /// Default output format ("table" or "json")
    pub format: Option<String>,
}

impl Settings {
    /// Load settings from the given file, or the default location
    pub fn load(override_path: Option<&Path>) -> Result<Self> {
        let path = match override_path {
            Some(path) => path.to_path_buf(),
            None => Self::config_path()?,
        };

        if !path.exists() {
            // A missing explicit file is an error; a missing default is not
            if override_path.is_some() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        serde_json::from_str(&content).context("Failed to parse config file")
    }

    /// Get the default configuration file path
    fn config_path() -> Result<PathBuf> {
        let home = dirs_next::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".config").join("falconeye").join("config.json"))
    }
}
