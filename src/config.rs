//! Configuration file support.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/sunrise-light/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::ramp::{RampConfig, DEFAULT_HOLD_MINUTES, DEFAULT_RAMP_MINUTES};
use crate::{Error, Result};

const APP_DIR: &str = "sunrise-light";

/// Application configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ramp: RampSection,

    #[serde(default)]
    pub store: StoreSection,

    #[serde(default)]
    pub driver: DriverSection,

    #[serde(default)]
    pub light: LightSection,
}

/// Ramp and hold durations in minutes
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RampSection {
    #[serde(default = "default_ramp_minutes")]
    pub ramp_minutes: u32,

    #[serde(default = "default_hold_minutes")]
    pub hold_minutes: u32,
}

impl Default for RampSection {
    fn default() -> Self {
        Self {
            ramp_minutes: default_ramp_minutes(),
            hold_minutes: default_hold_minutes(),
        }
    }
}

/// Where alarms are persisted
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreSection {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

/// Driving loop settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DriverSection {
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

impl Default for DriverSection {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

/// Which light the driver controls
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LightKind {
    /// No hardware, brightness changes are only logged
    #[default]
    Log,
    /// ELK-BLEDOM compatible Bluetooth strip
    Ble,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LightSection {
    #[serde(default)]
    pub kind: LightKind,

    /// MAC address or platform id of the strip; first compatible one if unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

fn default_ramp_minutes() -> u32 {
    DEFAULT_RAMP_MINUTES
}

fn default_hold_minutes() -> u32 {
    DEFAULT_HOLD_MINUTES
}

fn default_store_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("alarms.json")
}

fn default_tick_interval_ms() -> u64 {
    1000
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.toml")
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.ramp()?;
        if self.driver.tick_interval_ms == 0 {
            return Err(Error::Config("tick_interval_ms must be positive".into()));
        }
        Ok(())
    }

    /// The validated ramp configuration
    pub fn ramp(&self) -> Result<RampConfig> {
        RampConfig::from_minutes(self.ramp.ramp_minutes, self.ramp.hold_minutes)
    }

    pub fn tick_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.driver.tick_interval_ms)
    }
}
