//! Backend connection configuration
//!
//! Three values are needed to reach the remote store: the API base URL,
//! the bearer token, and the space id whose containers hold the tables.
//! They come from a JSON config file, from the environment
//! (`RELAYDB_BASE_URL`, `RELAYDB_TOKEN`, `RELAYDB_SPACE`), or both;
//! environment values override file values.

use std::env;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {reason}")]
    Unreadable { path: String, reason: String },

    #[error("failed to parse config file '{path}': {reason}")]
    Invalid { path: String, reason: String },

    #[error("missing configuration value '{0}'")]
    Missing(&'static str),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Connection settings for the remote store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// API base URL
    #[serde(default)]
    pub base_url: String,
    /// Bearer token
    #[serde(default)]
    pub token: String,
    /// Space whose containers hold the tables
    #[serde(default)]
    pub space: String,
}

impl Config {
    /// Loads settings from a JSON file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let text = fs::read_to_string(path).map_err(|e| ConfigError::Unreadable {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        serde_json::from_str(&text).map_err(|e| ConfigError::Invalid {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    /// Overlays environment variables onto the current values
    pub fn apply_env(&mut self) {
        if let Ok(value) = env::var("RELAYDB_BASE_URL") {
            self.base_url = value;
        }
        if let Ok(value) = env::var("RELAYDB_TOKEN") {
            self.token = value;
        }
        if let Ok(value) = env::var("RELAYDB_SPACE") {
            self.space = value;
        }
    }

    /// Checks that every required value is present
    pub fn validate(self) -> ConfigResult<Self> {
        if self.base_url.is_empty() {
            return Err(ConfigError::Missing("base_url"));
        }
        if self.token.is_empty() {
            return Err(ConfigError::Missing("token"));
        }
        if self.space.is_empty() {
            return Err(ConfigError::Missing("space"));
        }
        Ok(self)
    }

    /// Full resolution: optional file, then environment, then validation
    pub fn resolve(path: Option<&Path>) -> ConfigResult<Self> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_env();
        config.validate()
    }
}
