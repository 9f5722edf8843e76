//! Run configuration, loaded from YAML.
//!
//! Durations are written the human way ("60s", "2m") and parsed with
//! humantime.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use ticksheet_core::learn::HINT_THRESHOLD;

/// Errors from configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

fn serialize_duration<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&humantime::format_duration(*d).to_string())
}

fn deserialize_duration<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
    let raw = String::deserialize(d)?;
    humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_attempts() -> usize {
    3
}

fn default_max_tokens() -> u32 {
    4000
}

fn default_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_hint_threshold() -> f64 {
    HINT_THRESHOLD
}

fn default_audit_dir() -> PathBuf {
    PathBuf::from("audit")
}

/// Configuration for a pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Oracle model name
    #[serde(default = "default_model")]
    pub model: String,

    /// Number of independent consensus attempts
    #[serde(default = "default_attempts")]
    pub attempts: usize,

    /// Max tokens per oracle response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Per-call timeout
    #[serde(
        default = "default_timeout",
        serialize_with = "serialize_duration",
        deserialize_with = "deserialize_duration"
    )]
    pub timeout: Duration,

    /// Whether the generative normalization pass may be attempted
    #[serde(default)]
    pub allow_generative: bool,

    /// Minimum confidence for learned hints to reach a prompt
    #[serde(default = "default_hint_threshold")]
    pub hint_threshold: f64,

    /// Directory for audit artifacts (raw responses, warnings)
    #[serde(default = "default_audit_dir")]
    pub audit_dir: PathBuf,

    /// Learning store database path; None disables learning
    #[serde(default)]
    pub store_path: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            attempts: default_attempts(),
            max_tokens: default_max_tokens(),
            timeout: default_timeout(),
            allow_generative: false,
            hint_threshold: default_hint_threshold(),
            audit_dir: default_audit_dir(),
            store_path: None,
        }
    }
}

impl RunConfig {
    /// Load from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse from YAML text.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: RunConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.attempts == 0 {
            return Err(ConfigError::Invalid("attempts must be at least 1".to_string()));
        }
        if !(0.0..=1.0).contains(&self.hint_threshold) {
            return Err(ConfigError::Invalid(
                "hint_threshold must be within [0, 1]".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RunConfig::default();
        assert_eq!(config.attempts, 3);
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert!(!config.allow_generative);
    }

    #[test]
    fn test_parse_yaml_with_humantime() {
        let config = RunConfig::from_yaml(
            "model: gpt-4o\nattempts: 5\ntimeout: 90s\nallow_generative: true\n",
        )
        .unwrap();
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.attempts, 5);
        assert_eq!(config.timeout, Duration::from_secs(90));
        assert!(config.allow_generative);
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let result = RunConfig::from_yaml("attempts: 0\n");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_bad_threshold_rejected() {
        let result = RunConfig::from_yaml("hint_threshold: 1.5\n");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }
}
