use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_MODEL: &str = "meta-llama/llama-3-70b-instruct";
pub const DEFAULT_ENDPOINT: &str = "https://openrouter.ai/api/v1/chat/completions";
pub const DEFAULT_REQUEST_INTERVAL_SECS: u64 = 10;
pub const DEFAULT_TIMEOUT_SECS: u64 = 45;
pub const DEFAULT_REFERER: &str = "https://llama-assistant.streamlit.app";
pub const DEFAULT_APP_TITLE: &str = "Llama 3 Assistant";

const APP_DIR: &str = "llama-buddy";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub api_key: Option<String>,
    pub model: String,
    pub endpoint: String,
    pub request_interval_secs: u64,
    pub timeout_secs: u64,
    pub referer: String,
    pub app_title: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            request_interval_secs: DEFAULT_REQUEST_INTERVAL_SECS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            referer: DEFAULT_REFERER.to_string(),
            app_title: DEFAULT_APP_TITLE.to_string(),
        }
    }
}

impl Config {
    /// Load the config file (defaults if it does not exist), then apply
    /// environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// A zero timeout fails every request; a zero interval disables throttling.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_secs == 0 {
            return Err(ConfigError::ZeroDuration {
                field: "timeout_secs",
            });
        }
        if self.request_interval_secs == 0 {
            return Err(ConfigError::ZeroDuration {
                field: "request_interval_secs",
            });
        }
        Ok(())
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Environment wins over the file. `lookup` is `std::env::var` outside tests.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty("OPENROUTER_API_KEY").or_else(|| non_empty("API_KEY")) {
            self.api_key = Some(key);
        }
        if let Some(model) = non_empty("LLAMA_BUDDY_MODEL") {
            self.model = model;
        }
        if let Some(endpoint) = non_empty("LLAMA_BUDDY_ENDPOINT") {
            self.endpoint = endpoint;
        }
    }

    /// The credential, or an error naming where it should come from.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        match self.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => Ok(key),
            _ => {
                let path = Self::config_path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|_| "config.json".to_string());
                Err(ConfigError::MissingApiKey(path))
            }
        }
    }

    pub fn request_interval(&self) -> Duration {
        Duration::from_secs(self.request_interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join(APP_DIR))
    }

    pub fn config_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::config_dir()?.join("config.json"))
    }
}
