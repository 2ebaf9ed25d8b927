use crate::classify::Thresholds;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub actions: ActionsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Substring the device name must contain; empty matches any device.
    #[serde(default)]
    pub match_name: String,
    #[serde(default = "DeviceConfig::default_grab")]
    pub grab: bool,
}

impl DeviceConfig {
    fn default_grab() -> bool {
        true
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            match_name: String::new(),
            grab: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    #[serde(default = "TimingConfig::default_short_max")]
    pub short_max_ms: u64,
    #[serde(default = "TimingConfig::default_long_min")]
    pub long_min_ms: u64,
    #[serde(default = "TimingConfig::default_poll_interval")]
    pub poll_interval_ms: u64,
}

impl TimingConfig {
    fn default_short_max() -> u64 {
        700
    }
    fn default_long_min() -> u64 {
        1500
    }
    fn default_poll_interval() -> u64 {
        250
    }

    pub fn thresholds(&self) -> Result<Thresholds> {
        Thresholds::new(
            Duration::from_millis(self.short_max_ms),
            Duration::from_millis(self.long_min_ms),
        )
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            short_max_ms: 700,
            long_min_ms: 1500,
            poll_interval_ms: 250,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionsConfig {
    #[serde(default = "ActionsConfig::default_wake_unit")]
    pub wake_unit: String,
    #[serde(default = "ActionsConfig::default_logout_unit")]
    pub logout_unit: String,
    #[serde(default = "ActionsConfig::default_screenoff_unit")]
    pub screenoff_unit: String,
}

impl ActionsConfig {
    fn default_wake_unit() -> String {
        "os-wake.service".into()
    }
    fn default_logout_unit() -> String {
        "os-wlogout.service".into()
    }
    fn default_screenoff_unit() -> String {
        "os-screenoff.service".into()
    }
}

impl Default for ActionsConfig {
    fn default() -> Self {
        Self {
            wake_unit: Self::default_wake_unit(),
            logout_unit: Self::default_logout_unit(),
            screenoff_unit: Self::default_screenoff_unit(),
        }
    }
}

impl Config {
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("/etc"))
            .join("powerkeyd")
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        toml::from_str(&contents).with_context(|| "parsing config TOML")
    }
}
