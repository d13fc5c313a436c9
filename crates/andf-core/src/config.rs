use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_MAX_RESULTS: u32 = 5;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Environment variable that overrides `base_url`
pub const BASE_URL_ENV: &str = "ANDF_API_URL";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub base_url: String,
    /// Result-count hint sent with every chat request
    pub max_results: u32,
    pub request_timeout_secs: u64,
    /// Probe the backend again whenever an exchange fails
    pub reprobe_on_failure: bool,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            max_results: DEFAULT_MAX_RESULTS,
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            reprobe_on_failure: true,
            log_level: "info".to_string(),
        }
    }

    /// Load from the user config dir, then apply environment overrides.
    /// On first run the defaults are written out so there is a file to edit.
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;
        let mut config = Self::load_from(&config_path)?;

        if !config_path.exists() {
            if let Err(e) = config.save() {
                tracing::warn!(
                    path = %config_path.display(),
                    error = %e,
                    "could not write default config"
                );
            }
        }

        // Env var wins over the file
        if let Ok(url) = std::env::var(BASE_URL_ENV) {
            config.apply_base_url(&url);
        }

        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&config_content)
            .map_err(|e| anyhow!("Invalid config file {:?}: {}", path, e))?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::get_config_path()?;
        self.save_to(&config_path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    pub fn apply_base_url(&mut self, url: &str) {
        let trimmed = url.trim().trim_end_matches('/');
        if !trimmed.is_empty() {
            self.base_url = trimmed.to_string();
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("andf-assistant").join("config.json"))
    }
}
