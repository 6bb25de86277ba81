use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::types::{SwitcherConfig, MAX_TRANSITION_DURATION_MS};

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Config validation failed: {message}")]
    ValidationError { message: String },
}

impl SwitcherConfig {
    /// Returns the path to the configuration file.
    ///
    /// Uses `~/.config/viewswitch/config.toml` on Unix/macOS, or the
    /// platform equivalent via `dirs::config_dir()`. Falls back to the
    /// current directory if no config directory is known.
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        config_dir.join("viewswitch").join("config.toml")
    }

    /// Loads configuration from the default config file, or defaults if
    /// the file does not exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path();
        if !path.exists() {
            return Ok(SwitcherConfig::default());
        }
        Self::load_from(&path)
    }

    /// Loads and validates configuration from `path`.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: SwitcherConfig = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;

        config.validate()?;
        tracing::debug!(path = %path.display(), "Loaded switcher config");
        Ok(config)
    }

    /// Parses and validates configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: SwitcherConfig = toml::from_str(content).map_err(|e| ConfigError::ParseError {
            path: PathBuf::from("<inline>"),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// Checks:
    /// - The transition duration does not exceed the maximum
    /// - A description template, if present, is not blank
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.transition_duration_ms > MAX_TRANSITION_DURATION_MS {
            return Err(ConfigError::ValidationError {
                message: format!(
                    "transition_duration_ms must be at most {}, got {}",
                    MAX_TRANSITION_DURATION_MS, self.transition_duration_ms
                ),
            });
        }

        if let Some(template) = &self.automation_description_template {
            if template.trim().is_empty() {
                return Err(ConfigError::ValidationError {
                    message: "automation_description_template must not be blank".to_string(),
                });
            }
        }

        Ok(())
    }
}
