use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, path::PathBuf};

use crate::{
    cache::DEFAULT_CACHE_DURATION_SECS,
    coordinates::Coordinates,
    http::{DEFAULT_MAX_ATTEMPTS, DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT},
    provider::{ProviderId, mock::Scenario, nws::NWS_BASE_URL},
};

pub const DEFAULT_LATITUDE: &str = "40.0931191";
pub const DEFAULT_LONGITUDE: &str = "-83.017962";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5 * 60;

pub const ENV_PROVIDER: &str = "CLOCK_WEATHER_PROVIDER";
pub const ENV_LAT_LON: &str = "CLOCK_WEATHER_LAT_LON";

/// Settings for the weather.gov provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NwsConfig {
    pub base_url: String,
    /// weather.gov rejects requests without a User-Agent; put contact info here.
    pub user_agent: String,
    pub timeout_secs: u64,
    pub max_attempts: usize,
}

impl Default for NwsConfig {
    fn default() -> Self {
        Self {
            base_url: NWS_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MockConfig {
    pub scenario: Scenario,
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// provider = "nws"
/// latitude = "40.0931191"
/// longitude = "-83.017962"
/// cache_duration_secs = 900
///
/// [nws]
/// user_agent = "my-clock (me@example.com)"
///
/// [mock]
/// scenario = "rainy"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub provider: ProviderId,

    /// Kept as text so a typo in the file is reported as a coordinate error
    /// rather than a TOML type error.
    pub latitude: String,
    pub longitude: String,

    pub cache_duration_secs: u64,
    pub poll_interval_secs: u64,

    pub nws: NwsConfig,
    pub mock: MockConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: ProviderId::default(),
            latitude: DEFAULT_LATITUDE.to_string(),
            longitude: DEFAULT_LONGITUDE.to_string(),
            cache_duration_secs: DEFAULT_CACHE_DURATION_SECS,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            nws: NwsConfig::default(),
            mock: MockConfig::default(),
        }
    }
}

impl Config {
    /// Validated coordinates from the `latitude`/`longitude` fields.
    pub fn coordinates(&self) -> Result<Coordinates> {
        Coordinates::parse(&self.latitude, &self.longitude)
            .with_context(|| format!("Invalid location in configuration: {}, {}", self.latitude, self.longitude))
    }

    pub fn set_coordinates(&mut self, coordinates: Coordinates) {
        self.latitude = coordinates.latitude().to_string();
        self.longitude = coordinates.longitude().to_string();
    }

    /// Load config from disk, or return the defaults if it doesn't exist yet.
    /// Environment overrides are applied on top.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        let mut cfg = Self::load_from(&path)?;
        cfg.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(cfg)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, use defaults.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_file_path()?;
        self.save_to(&path)?;
        Ok(path)
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
        let dirs = ProjectDirs::from("dev", "clock-weather", "clock-weather")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Apply `CLOCK_WEATHER_PROVIDER` and `CLOCK_WEATHER_LAT_LON` (`"lat,lon"`).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(provider) = lookup(ENV_PROVIDER) {
            self.provider = ProviderId::try_from(provider.as_str())
                .with_context(|| format!("Invalid {ENV_PROVIDER}"))?;
        }

        if let Some(pair) = lookup(ENV_LAT_LON) {
            let coordinates =
                Coordinates::parse_pair(&pair).with_context(|| format!("Invalid {ENV_LAT_LON}"))?;
            self.set_coordinates(coordinates);
        }

        Ok(())
    }
}
