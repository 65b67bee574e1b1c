//! Server configuration

use anyhow::{Context, Result};
use falconeye_lib::{DetectionConfig, DEFAULT_CONTAMINATION, DEFAULT_K, DEFAULT_SCORE_CHANNEL};
use serde::Deserialize;

/// Server configuration
///
/// Read from an optional `falconeye.toml` and `FALCONEYE_*` environment
/// variables, environment taking precedence.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Instance name used in structured logs
    #[serde(default = "default_instance")]
    pub instance: String,

    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Score channel for requests that carry no config
    #[serde(default = "default_score_channel")]
    pub default_score_channel: String,

    #[serde(default = "default_k")]
    pub default_k: f64,

    #[serde(default = "default_contamination")]
    pub default_contamination: f64,

    #[serde(default)]
    pub default_enable_ml: bool,

    #[serde(default)]
    pub default_seed: Option<u64>,
}

fn default_instance() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "falconeye".to_string())
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_score_channel() -> String {
    DEFAULT_SCORE_CHANNEL.to_string()
}

fn default_k() -> f64 {
    DEFAULT_K
}

fn default_contamination() -> f64 {
    DEFAULT_CONTAMINATION
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            instance: default_instance(),
            bind_address: default_bind_address(),
            port: default_port(),
            default_score_channel: default_score_channel(),
            default_k: default_k(),
            default_contamination: default_contamination(),
            default_enable_ml: false,
            default_seed: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from `falconeye.toml` (optional) and environment
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("falconeye").required(false))
            .add_source(config::Environment::with_prefix("FALCONEYE").try_parsing(true))
            .build()
            .context("Failed to read server configuration")?;

        config
            .try_deserialize()
            .context("Failed to parse server configuration")
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    /// Detection settings applied to requests without their own config
    pub fn default_detection(&self) -> DetectionConfig {
        DetectionConfig {
            score_channel: self.default_score_channel.clone(),
            k: self.default_k,
            contamination: self.default_contamination,
            enable_ml: self.default_enable_ml,
            seed: self.default_seed,
            ..DetectionConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.listen_addr(), "0.0.0.0:8080");

        let detection = config.default_detection();
        assert_eq!(detection.k, DEFAULT_K);
        assert!(!detection.enable_ml);
        assert!(detection.validate().is_ok());
    }

    #[test]
    fn test_default_detection_carries_overrides() {
        let config = ServerConfig {
            default_k: 2.5,
            default_enable_ml: true,
            default_seed: Some(42),
            ..ServerConfig::default()
        };
        let detection = config.default_detection();
        assert_eq!(detection.k, 2.5);
        assert!(detection.enable_ml);
        assert_eq!(detection.seed, Some(42));
    }

    #[test]
    fn test_deserialize_partial_source() {
        let source = config::Config::builder()
            .add_source(config::File::from_str(
                "port = 9090\ndefault_k = 2.0",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap();
        let config: ServerConfig = source.try_deserialize().unwrap();
        assert_eq!(config.port, 9090);
        assert_eq!(config.default_k, 2.0);
        assert_eq!(config.default_contamination, DEFAULT_CONTAMINATION);
    }
}
