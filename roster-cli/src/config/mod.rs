//! Application configuration
//!
//! Layered as: built-in defaults, then `config.toml` in the user config
//! directory, then `ROSTER_*` environment variables (a `.env` file is
//! honored), then command-line flags.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::resilience::{LogLevel, MonitoringConfig, ResilienceConfig, RetryConfig};

const APP_DIR: &str = "roster-cli";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default `env_logger` filter when `RUST_LOG` is unset
    pub log_level: String,
    pub api: ApiConfig,
    pub retry: RetryOptions,
}

/// Where the roster store lives and how its records look
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub collection: String,
    /// Field carrying the store-assigned identifier
    pub id_field: String,
    /// Store bookkeeping fields never offered for editing
    pub hidden_fields: Vec<String>,
    pub timeout_secs: u64,
    pub request_logging: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryOptions {
    pub enabled: bool,
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            retry: RetryOptions::default(),
            log_level: "info".to_string(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            collection: "students".to_string(),
            id_field: "id".to_string(),
            hidden_fields: vec!["__v".to_string()],
            timeout_secs: 30,
            request_logging: true,
        }
    }
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 30000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl Config {
    /// `~/.config/roster-cli/config.toml` (platform equivalent)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Load defaults, the config file if present, and environment overrides
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = match Self::default_path() {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => {
                log::debug!("No config file found, using defaults");
                Self::default()
            }
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }
        fs::write(path, self.to_toml()?)
            .with_context(|| format!("Failed to write config file: {}", path.display()))
    }

    /// Apply `ROSTER_*` overrides from the given lookup
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("ROSTER_BASE_URL") {
            self.api.base_url = url;
        }
        if let Some(collection) = lookup("ROSTER_COLLECTION") {
            self.api.collection = collection;
        }
        if let Some(id_field) = lookup("ROSTER_ID_FIELD") {
            self.api.id_field = id_field;
        }
        if let Some(timeout) = lookup("ROSTER_TIMEOUT_SECS") {
            self.api.timeout_secs = timeout
                .trim()
                .parse()
                .with_context(|| format!("ROSTER_TIMEOUT_SECS is not a number: {}", timeout))?;
        }
        if let Some(level) = lookup("ROSTER_LOG_LEVEL") {
            self.log_level = level;
        }
        Ok(())
    }

    /// Build the client resilience settings
    pub fn resilience(&self) -> ResilienceConfig {
        let retry = &self.retry;
        ResilienceConfig {
            retry: RetryConfig {
                max_attempts: if retry.enabled { retry.max_attempts } else { 1 },
                base_delay: Duration::from_millis(retry.base_delay_ms),
                max_delay: Duration::from_millis(retry.max_delay_ms),
                backoff_multiplier: retry.backoff_multiplier,
                jitter: retry.jitter,
            },
            timeout: Duration::from_secs(self.api.timeout_secs.max(1)),
            monitoring: MonitoringConfig {
                request_logging: self.api.request_logging,
                log_level: LogLevel::parse(&self.log_level),
            },
        }
    }
}
