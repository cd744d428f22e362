use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};

use crate::model::Coordinate;

/// Default seconds between poll cycles when the config does not set one.
pub const DEFAULT_POLL_INTERVAL_SECS: f32 = 600.0;

/// Credentials for the two external services.
///
/// Example TOML:
/// [credentials]
/// weather_api_key = "..."
/// ip_api_key = "..."
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Credentials {
    pub weather_api_key: Option<String>,
    pub ip_api_key: Option<String>,
}

/// Top-level configuration stored on disk.
///
/// The core never hard-codes secrets: keys are loaded here once by the
/// bootstrap (the CLI) and passed explicitly into the resolver and provider
/// constructors.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub credentials: Credentials,

    /// Seconds between poll cycles; falls back to
    /// [`DEFAULT_POLL_INTERVAL_SECS`] when absent.
    pub poll_interval_seconds: Option<f32>,

    /// Manual coordinate override, used instead of device/IP resolution.
    pub coordinate: Option<Coordinate>,
}

impl Config {
    /// Weather API key, with a hint when it has not been configured yet.
    pub fn weather_api_key(&self) -> Result<&str> {
        self.credentials.weather_api_key.as_deref().ok_or_else(|| {
            anyhow!(
                "No weather API key configured.\n\
                 Hint: run `weathersync configure` and enter your OpenWeather key."
            )
        })
    }

    /// IP-geolocation API key, with a hint when it has not been configured yet.
    pub fn ip_api_key(&self) -> Result<&str> {
        self.credentials.ip_api_key.as_deref().ok_or_else(|| {
            anyhow!(
                "No IP-geolocation API key configured.\n\
                 Hint: run `weathersync configure` and enter your ipstack key."
            )
        })
    }

    pub fn poll_interval_seconds(&self) -> f32 {
        self.poll_interval_seconds
            .unwrap_or(DEFAULT_POLL_INTERVAL_SECS)
    }

    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            // First run: no config file, return empty.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "weathersync", "weathersync-cli")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }
}
