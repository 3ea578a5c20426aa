use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{bridge::FetchPolicy, location::PositionOptions, model::Coordinates};

pub const DEFAULT_ENDPOINT: &str = "http://api.openweathermap.org/data/2.5/weather";

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_maximum_age_secs() -> u64 {
    60
}

/// Location lookup settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationConfig {
    /// Fallback coordinates used when no location service is available.
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// A fix younger than this is reused instead of asking again.
    #[serde(default = "default_maximum_age_secs")]
    pub maximum_age_secs: u64,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            latitude: None,
            longitude: None,
            timeout_secs: default_timeout_secs(),
            maximum_age_secs: default_maximum_age_secs(),
        }
    }
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// api_key = "..."
/// fetch_policy = "coalesce"
///
/// [location]
/// latitude = 51.5
/// longitude = -0.12
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// OpenWeatherMap `appid`.
    pub api_key: Option<String>,

    /// Overrides the current-weather endpoint.
    pub endpoint: Option<String>,

    /// Upper bound on one weather request.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Page logged when the host opens the settings screen.
    pub settings_url: Option<String>,

    #[serde(default)]
    pub fetch_policy: FetchPolicy,

    #[serde(default)]
    pub location: LocationConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: None,
            request_timeout_secs: default_request_timeout_secs(),
            settings_url: None,
            fetch_policy: FetchPolicy::default(),
            location: LocationConfig::default(),
        }
    }
}

impl Config {
    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, return empty.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "weather-bridge", "weather-bridge")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key.as_deref().filter(|key| !key.is_empty()).ok_or_else(|| {
            anyhow!(
                "No OpenWeatherMap API key configured.\n\
                 Hint: run `weather-bridge configure` or set OPENWEATHER_API_KEY."
            )
        })
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn position_options(&self) -> PositionOptions {
        PositionOptions {
            timeout: Duration::from_secs(self.location.timeout_secs),
            maximum_age: Duration::from_secs(self.location.maximum_age_secs),
        }
    }

    /// Both coordinates must be set for a usable fallback.
    pub fn default_coordinates(&self) -> Option<Coordinates> {
        match (self.location.latitude, self.location.longitude) {
            (Some(lat), Some(lon)) => Some(Coordinates::new(lat, lon)),
            _ => None,
        }
    }

    pub fn set_default_coordinates(&mut self, coords: Coordinates) {
        self.location.latitude = Some(coords.latitude);
        self.location.longitude = Some(coords.longitude);
    }
}
