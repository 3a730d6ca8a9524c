//! Monitor configuration management

use crate::usb::DeviceFilter;
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default)]
    pub monitor: MonitorSettings,
    #[serde(default)]
    pub usb: UsbSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorSettings {
    #[serde(default = "MonitorSettings::default_log_level")]
    pub log_level: String,
    /// Delay between connection attempts while no mouse is streaming
    #[serde(default = "MonitorSettings::default_connect_retry")]
    pub connect_retry_ms: u64,
    /// Slots in the host device table
    #[serde(default = "MonitorSettings::default_max_devices")]
    pub max_devices: usize,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
            connect_retry_ms: Self::default_connect_retry(),
            max_devices: Self::default_max_devices(),
        }
    }
}

impl MonitorSettings {
    fn default_log_level() -> String {
        "info".to_string()
    }

    fn default_connect_retry() -> u64 {
        500
    }

    fn default_max_devices() -> usize {
        common::MAX_DEVICE_CONNECTED
    }

    pub fn connect_retry(&self) -> Duration {
        Duration::from_millis(self.connect_retry_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsbSettings {
    /// VID:PID patterns of devices the host may list (empty = all)
    #[serde(default)]
    pub filters: Vec<String>,
    /// Timeout of a single interrupt read; expiry completes the read empty
    #[serde(default = "UsbSettings::default_read_timeout")]
    pub read_timeout_ms: u64,
    /// Pending reads the transfer worker accepts before reporting a full queue
    #[serde(default = "UsbSettings::default_queue_depth")]
    pub queue_depth: usize,
}

impl Default for UsbSettings {
    fn default() -> Self {
        Self {
            filters: Vec::new(),
            read_timeout_ms: Self::default_read_timeout(),
            queue_depth: Self::default_queue_depth(),
        }
    }
}

impl UsbSettings {
    fn default_read_timeout() -> u64 {
        100
    }

    fn default_queue_depth() -> usize {
        4
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

impl MonitorConfig {
    /// Load configuration from the specified path
    ///
    /// Without a path the user config directory is tried first, then
    /// `/etc/hid-mouse/monitor.toml`.
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = if let Some(p) = path {
            expand_path(&p)
        } else {
            let candidates = vec![
                Self::default_path(),
                PathBuf::from("/etc/hid-mouse/monitor.toml"),
            ];

            candidates
                .into_iter()
                .find(|p| p.exists())
                .ok_or_else(|| anyhow!("No configuration file found, using defaults"))?
        };

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: MonitorConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        config.validate()?;

        tracing::info!("Loaded configuration from: {}", config_path.display());
        Ok(config)
    }

    /// Load configuration or return defaults if not found
    pub fn load_or_default() -> Self {
        match Self::load(None) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to load config: {}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Save configuration to the specified path
    pub fn save(&self, path: &Path) -> Result<()> {
        let path = expand_path(path);
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(&path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::info!("Saved configuration to: {}", path.display());
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("hid-mouse").join("monitor.toml")
        } else {
            PathBuf::from(".config/hid-mouse/monitor.toml")
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.monitor.log_level.as_str()) {
            return Err(anyhow!(
                "Invalid log level '{}', must be one of: {}",
                self.monitor.log_level,
                valid_levels.join(", ")
            ));
        }

        if self.monitor.connect_retry_ms == 0 {
            return Err(anyhow!("connect_retry_ms must be greater than 0"));
        }

        if !(1..=127).contains(&self.monitor.max_devices) {
            return Err(anyhow!(
                "Invalid max_devices {}, must be between 1 and 127",
                self.monitor.max_devices
            ));
        }

        DeviceFilter::parse_all(&self.usb.filters)?;

        if self.usb.read_timeout_ms == 0 {
            return Err(anyhow!("read_timeout_ms must be greater than 0"));
        }

        if self.usb.queue_depth == 0 {
            return Err(anyhow!("queue_depth must be at least 1"));
        }

        Ok(())
    }
}

/// Expand `~` and environment variables in a user-supplied path
pub fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    match shellexpand::full(&raw) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => PathBuf::from(shellexpand::tilde(&raw).as_ref()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MonitorConfig::default();
        assert_eq!(config.monitor.log_level, "info");
        assert_eq!(config.monitor.connect_retry_ms, 500);
        assert_eq!(config.monitor.max_devices, 5);
        assert_eq!(config.usb.read_timeout(), Duration::from_millis(100));
        assert_eq!(config.usb.queue_depth, 4);
        assert!(config.usb.filters.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_filters() {
        let mut config = MonitorConfig::default();
        config.usb.filters = vec!["0x046d:0xc077".to_string(), "*:*".to_string()];
        assert!(config.validate().is_ok());

        config.usb.filters.push("046d:c077".to_string());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("must start with '0x'"));
    }

    #[test]
    fn test_validate_log_level() {
        let mut config = MonitorConfig::default();

        config.monitor.log_level = "verbose".to_string();
        assert!(config.validate().is_err());

        config.monitor.log_level = "debug".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_limits() {
        let mut config = MonitorConfig::default();
        config.monitor.max_devices = 0;
        assert!(config.validate().is_err());

        config.monitor.max_devices = 128;
        assert!(config.validate().is_err());

        config.monitor.max_devices = 127;
        assert!(config.validate().is_ok());

        config.usb.queue_depth = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: MonitorConfig = toml::from_str("[usb]\nfilters = [\"0x046d:*\"]\n").unwrap();

        assert_eq!(config.usb.filters, vec!["0x046d:*".to_string()]);
        assert_eq!(config.usb.queue_depth, 4);
        assert_eq!(config.monitor, MonitorSettings::default());
    }

    #[test]
    fn test_expand_path_tilde() {
        let expanded = expand_path(Path::new("~/monitor.toml"));
        assert!(!expanded.to_string_lossy().starts_with('~') || dirs::home_dir().is_none());
    }
}
