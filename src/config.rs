//! Configuration management for Magbank
//!
//! This module handles loading, validation, and management of the application
//! configuration from YAML files, with a couple of environment variable
//! overrides for the things people toggle most.

use crate::error::{MonitorError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

mod defaults;

/// Environment variable naming an explicit config file
pub const CONFIG_ENV: &str = "MAGBANK_CONFIG";

/// Environment variable forcing simulation mode
pub const SIMULATE_ENV: &str = "MAGBANK_SIMULATE";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// USB tester identification and transport policy
    pub device: DeviceConfig,

    /// Session accounting and charge detection
    pub session: SessionConfig,

    /// Host counter sampling
    pub counters: CountersConfig,

    /// Simulated charge cycle used instead of real hardware
    pub simulation: SimulationConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Display/log refresh cadence in milliseconds
    pub refresh_interval_ms: u64,

    /// Use the simulator instead of the USB tester
    pub simulate: bool,
}

/// FNB58 USB parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// USB vendor ID
    pub vendor_id: u16,

    /// USB product ID
    pub product_id: u16,

    /// HID interface carrying the data stream
    pub interface: u8,

    /// Interrupt OUT endpoint address
    pub endpoint_out: u8,

    /// Interrupt IN endpoint address
    pub endpoint_in: u8,

    /// Per-read timeout in milliseconds
    pub read_timeout_ms: u64,

    /// Consecutive read failures before the link is declared disconnected
    pub max_consecutive_failures: u32,

    /// Delay between reconnection attempts in milliseconds
    pub reconnect_interval_ms: u64,
}

/// Session accounting parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Power above which a device counts as charging (W)
    pub charge_threshold_w: f64,

    /// Time power must stay below threshold before charging is complete (s)
    pub debounce_s: f64,

    /// Smoothing weight for the temperature EMA (0..1]
    pub temperature_alpha: f64,

    /// Interval between consecutive samples inside a packet (ms)
    pub sample_interval_ms: u64,

    /// Number of recent protocol guesses used for majority voting
    pub protocol_vote_window: usize,
}

/// Host counter sampling parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CountersConfig {
    /// Root of the network class directory
    pub sysfs_root: PathBuf,

    /// Interfaces whose statistics are sampled
    pub interfaces: Vec<String>,

    /// Sampling cadence in milliseconds
    pub refresh_interval_ms: u64,
}

/// Simulated charge cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Duration of steady charging (s)
    pub charge_s: f64,

    /// Duration of the linear ramp down to zero current (s)
    pub ramp_s: f64,

    /// Duration at zero current after the ramp (s)
    pub idle_s: f64,

    /// Bus voltage (V)
    pub voltage_v: f64,

    /// Steady charging current (A)
    pub current_a: f64,

    /// Pace packets at the device cadence
    pub realtime: bool,

    /// Start a new cycle after the idle phase instead of idling forever
    pub repeat: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub level: String,

    /// Path to log file or directory
    pub file: String,

    /// Number of rotated files to keep
    pub backup_count: u32,

    /// Whether to log to console
    pub console_output: bool,

    /// Whether to use JSON format
    pub json_format: bool,
}

impl SessionConfig {
    pub fn debounce(&self) -> Duration {
        Duration::try_from_secs_f64(self.debounce_s.max(0.0)).unwrap_or(Duration::MAX)
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from the first existing default location,
    /// apply environment overrides and validate
    pub fn load() -> Result<Self> {
        let mut config = match Self::locate() {
            Some(path) => Self::from_file(&path)?,
            None => Config::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn locate() -> Option<PathBuf> {
        if let Some(explicit) = std::env::var_os(CONFIG_ENV) {
            return Some(PathBuf::from(explicit));
        }

        let mut candidates = vec![PathBuf::from("magbank.yaml")];
        if let Some(home) = std::env::var_os("HOME") {
            candidates.push(Path::new(&home).join(".config/magbank/config.yaml"));
        }
        candidates.push(PathBuf::from("/etc/magbank/config.yaml"));

        candidates.into_iter().find(|p| p.exists())
    }

    /// Apply `MAGBANK_*` environment overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var(SIMULATE_ENV) {
            self.simulate = v == "1" || v.eq_ignore_ascii_case("true");
        }
    }

    /// Save configuration to a YAML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.device.read_timeout_ms == 0 {
            return Err(MonitorError::validation(
                "device.read_timeout_ms",
                "Must be greater than 0",
            ));
        }

        if self.device.max_consecutive_failures == 0 {
            return Err(MonitorError::validation(
                "device.max_consecutive_failures",
                "Must be greater than 0",
            ));
        }

        if !(self.session.charge_threshold_w.is_finite() && self.session.charge_threshold_w > 0.0)
        {
            return Err(MonitorError::validation(
                "session.charge_threshold_w",
                "Must be positive",
            ));
        }

        if !(self.session.debounce_s.is_finite() && self.session.debounce_s > 0.0) {
            return Err(MonitorError::validation(
                "session.debounce_s",
                "Must be positive",
            ));
        }
        if Duration::try_from_secs_f64(self.session.debounce_s).is_err() {
            return Err(MonitorError::validation(
                "session.debounce_s",
                "Too large to represent as a duration",
            ));
        }

        let alpha = self.session.temperature_alpha;
        if !(alpha > 0.0 && alpha <= 1.0) {
            return Err(MonitorError::validation(
                "session.temperature_alpha",
                "Must be within (0, 1]",
            ));
        }

        if self.session.sample_interval_ms == 0 {
            return Err(MonitorError::validation(
                "session.sample_interval_ms",
                "Must be greater than 0",
            ));
        }

        if self.session.protocol_vote_window == 0 {
            return Err(MonitorError::validation(
                "session.protocol_vote_window",
                "Must be at least 1",
            ));
        }

        if self.counters.refresh_interval_ms == 0 || self.refresh_interval_ms == 0 {
            return Err(MonitorError::validation(
                "refresh_interval_ms",
                "Must be greater than 0",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.device.vendor_id, 0x2E3C);
        assert_eq!(config.device.product_id, 0x5558);
        assert_eq!(config.device.interface, 3);
        assert_eq!(config.session.sample_interval_ms, 10);
        assert!((config.session.charge_threshold_w - 1.0).abs() < f64::EPSILON);
        assert!(!config.simulate);
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.session.temperature_alpha = 0.0;
        assert!(config.validate().is_err());

        config = Config::default();
        config.device.max_consecutive_failures = 0;
        assert!(config.validate().is_err());

        config = Config::default();
        config.session.debounce_s = -1.0;
        assert!(config.validate().is_err());

        config.session.debounce_s = 1e20;
        assert!(matches!(
            config.validate(),
            Err(MonitorError::Validation { ref field, .. }) if field == "session.debounce_s"
        ));
        assert_eq!(config.session.debounce(), Duration::MAX);
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let deserialized: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(config.device.endpoint_in, deserialized.device.endpoint_in);
        assert_eq!(
            config.session.protocol_vote_window,
            deserialized.session.protocol_vote_window
        );
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: Config = serde_yaml::from_str("simulate: true\nsession:\n  debounce_s: 4.0\n")
            .unwrap();
        assert!(config.simulate);
        assert!((config.session.debounce_s - 4.0).abs() < f64::EPSILON);
        assert_eq!(config.session.sample_interval_ms, 10);
        assert_eq!(config.device.read_timeout_ms, 1000);
    }
}
