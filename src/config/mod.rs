// src/config/mod.rs - Layered thermostat configuration
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::hardware::StoredGains;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("malformed time-of-day string: {0:?} (expected HH:MM:SS)")]
    BadTime(String),
}

/// Complete thermostat configuration as loaded from the TOML file.
///
/// Serde defaults form the lowest precedence layer, the file the middle
/// one; gains persisted by auto-tune are applied on top by [`Config::resolve`].
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub controller: ControllerConfig,

    #[serde(default)]
    pub setback: SetbackConfig,

    #[serde(default)]
    pub store: StoreConfig,
}

/// Control loop configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ControllerConfig {
    #[serde(default = "default_name")]
    pub name: String,

    /// Sensor id the ambient temperature is read from.
    #[serde(default)]
    pub sensor: String,

    /// Actuator ids every command is dispatched to.
    #[serde(default)]
    pub actuators: Vec<String>,

    #[serde(default = "default_target")]
    pub target: f64,

    #[serde(default = "default_kp")]
    pub kp: f64,

    #[serde(default = "default_ki")]
    pub ki: f64,

    #[serde(default = "default_kd")]
    pub kd: f64,

    #[serde(default = "default_min_temp")]
    pub min_temp: f64,

    #[serde(default = "default_max_temp")]
    pub max_temp: f64,

    /// No control action while |target - ambient| stays within this band.
    #[serde(default = "default_deadband")]
    pub deadband: f64,

    /// Control tick interval in seconds.
    #[serde(default = "default_update_interval")]
    pub update_interval: u64,

    /// Maximum change of the commanded setpoint per tick.
    #[serde(default = "default_max_step")]
    pub max_step: f64,

    /// Relay offset used by the auto-tuner.
    #[serde(default = "default_autotune_amplitude")]
    pub autotune_amplitude: f64,

    /// HVAC mode, informational only ("auto", "heat" or "cool").
    #[serde(default = "default_mode")]
    pub mode: String,
}

/// Night setback / morning restore configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SetbackConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_setback_time")]
    pub setback_time: String,

    #[serde(default = "default_setback_temp")]
    pub setback_temp: f64,

    #[serde(default = "default_restore_time")]
    pub restore_time: String,

    #[serde(default = "default_restore_temp")]
    pub restore_temp: f64,

    #[serde(default = "default_restore_fan")]
    pub restore_fan: Option<String>,
}

/// Where auto-tuned gains are persisted.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    #[serde(default = "default_gains_path")]
    pub gains_path: String,
}

// Default value functions
fn default_name() -> String { "Smart PID Thermostat".to_string() }
fn default_target() -> f64 { 22.0 }
fn default_kp() -> f64 { 0.8 }
fn default_ki() -> f64 { 0.05 }
fn default_kd() -> f64 { 0.1 }
fn default_min_temp() -> f64 { 18.0 }
fn default_max_temp() -> f64 { 30.0 }
fn default_deadband() -> f64 { 0.3 }
fn default_update_interval() -> u64 { 60 }
fn default_max_step() -> f64 { 0.5 }
fn default_autotune_amplitude() -> f64 { 0.5 }
fn default_mode() -> String { "auto".to_string() }
fn default_true() -> bool { true }
fn default_setback_time() -> String { "23:00:00".to_string() }
fn default_setback_temp() -> f64 { 18.0 }
fn default_restore_time() -> String { "06:30:00".to_string() }
fn default_restore_temp() -> f64 { 23.0 }
fn default_restore_fan() -> Option<String> { Some("low".to_string()) }
fn default_gains_path() -> String { "thermostat_gains.json".to_string() }

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            sensor: String::new(),
            actuators: Vec::new(),
            target: default_target(),
            kp: default_kp(),
            ki: default_ki(),
            kd: default_kd(),
            min_temp: default_min_temp(),
            max_temp: default_max_temp(),
            deadband: default_deadband(),
            update_interval: default_update_interval(),
            max_step: default_max_step(),
            autotune_amplitude: default_autotune_amplitude(),
            mode: default_mode(),
        }
    }
}

impl Default for SetbackConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            setback_time: default_setback_time(),
            setback_temp: default_setback_temp(),
            restore_time: default_restore_time(),
            restore_temp: default_restore_temp(),
            restore_fan: default_restore_fan(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            gains_path: default_gains_path(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            controller: ControllerConfig::default(),
            setback: SetbackConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        tracing::info!("Loaded configuration from {}", path);
        Ok(config)
    }

    /// Validate the configuration. Called once at startup; any failure is
    /// fatal and the controller refuses to start.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let c = &self.controller;

        if c.sensor.is_empty() {
            return Err(ConfigError::Invalid("sensor id must be specified".into()));
        }
        if c.actuators.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one actuator id must be specified".into(),
            ));
        }
        if c.min_temp >= c.max_temp {
            return Err(ConfigError::Invalid(format!(
                "min_temp ({}) must be below max_temp ({})",
                c.min_temp, c.max_temp
            )));
        }
        if c.target < c.min_temp || c.target > c.max_temp {
            return Err(ConfigError::Invalid(format!(
                "target ({}) must lie within [{}, {}]",
                c.target, c.min_temp, c.max_temp
            )));
        }
        if c.deadband < 0.0 {
            return Err(ConfigError::Invalid("deadband must not be negative".into()));
        }
        if c.update_interval == 0 {
            return Err(ConfigError::Invalid(
                "update_interval must be positive".into(),
            ));
        }
        if c.max_step <= 0.0 {
            return Err(ConfigError::Invalid("max_step must be positive".into()));
        }
        if c.autotune_amplitude <= 0.0 {
            return Err(ConfigError::Invalid(
                "autotune_amplitude must be positive".into(),
            ));
        }
        // The relay commands target +/- amplitude unclamped, so the offsets
        // must fit the temperature bounds up front.
        if c.target - c.autotune_amplitude < c.min_temp
            || c.target + c.autotune_amplitude > c.max_temp
        {
            return Err(ConfigError::Invalid(format!(
                "autotune_amplitude ({}) would drive the setpoint outside [{}, {}]",
                c.autotune_amplitude, c.min_temp, c.max_temp
            )));
        }
        if !matches!(c.mode.as_str(), "auto" | "heat" | "cool") {
            return Err(ConfigError::Invalid(format!(
                "mode must be \"auto\", \"heat\" or \"cool\", got {:?}",
                c.mode
            )));
        }

        // Malformed time strings must be caught here, before any timer is
        // armed, rather than silently disabling setback behaviour.
        if self.setback.enabled {
            crate::schedule::parse_hms(&self.setback.setback_time)?;
            crate::schedule::parse_hms(&self.setback.restore_time)?;

            for (name, temp) in [
                ("setback_temp", self.setback.setback_temp),
                ("restore_temp", self.setback.restore_temp),
            ] {
                if temp < c.min_temp || temp > c.max_temp {
                    return Err(ConfigError::Invalid(format!(
                        "{} ({}) must lie within [{}, {}]",
                        name, temp, c.min_temp, c.max_temp
                    )));
                }
            }
        }

        Ok(())
    }

    /// Resolve the layered configuration into one immutable snapshot:
    /// defaults < file < stored gains.
    pub fn resolve(&self, stored: Option<&StoredGains>) -> Config {
        let mut resolved = self.clone();
        if let Some(gains) = stored {
            resolved.controller.kp = gains.kp;
            resolved.controller.ki = gains.ki;
            resolved.controller.kd = gains.kd;
        }
        resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.controller.sensor = "sensor.room".to_string();
        config.controller.actuators = vec!["climate.living_room".to_string()];
        config
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.controller.target, 22.0);
        assert_eq!(config.controller.kp, 0.8);
        assert_eq!(config.controller.ki, 0.05);
        assert_eq!(config.controller.kd, 0.1);
        assert_eq!(config.controller.deadband, 0.3);
        assert_eq!(config.controller.update_interval, 60);
        assert_eq!(config.setback.setback_time, "23:00:00");
        assert_eq!(config.setback.restore_fan.as_deref(), Some("low"));
    }

    #[test]
    fn test_parse_toml_config() {
        let toml_config = r#"
[controller]
sensor = "sensor.bedroom"
actuators = ["climate.bedroom"]
target = 21.0
kp = 1.2
deadband = 0.2

[setback]
setback_time = "22:30"
restore_temp = 22.5
        "#;
        let config: Config = toml::from_str(toml_config).unwrap();
        assert_eq!(config.controller.sensor, "sensor.bedroom");
        assert_eq!(config.controller.target, 21.0);
        assert_eq!(config.controller.kp, 1.2);
        // untouched fields fall back to defaults
        assert_eq!(config.controller.ki, 0.05);
        assert_eq!(config.setback.restore_time, "06:30:00");
        assert_eq!(config.setback.restore_temp, 22.5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_bounds() {
        let mut config = valid_config();
        config.controller.min_temp = 30.0;
        config.controller.max_temp = 18.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_missing_sensor() {
        let mut config = valid_config();
        config.controller.sensor = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_malformed_setback_time() {
        let mut config = valid_config();
        config.setback.setback_time = "half past eleven".to_string();
        assert!(config.validate().is_err());

        // disabled setback never parses the strings
        config.setback.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_out_of_bounds_overrides() {
        let mut config = valid_config();
        config.setback.setback_temp = 12.0;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.controller.autotune_amplitude = 10.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_unknown_mode() {
        let mut config = valid_config();
        config.controller.mode = "dry".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_resolve_applies_stored_gains_on_top() {
        let config = valid_config();
        let stored = StoredGains {
            kp: 1.5,
            ki: 0.02,
            kd: 0.4,
        };
        let resolved = config.resolve(Some(&stored));
        assert_eq!(resolved.controller.kp, 1.5);
        assert_eq!(resolved.controller.ki, 0.02);
        assert_eq!(resolved.controller.kd, 0.4);
        // everything else untouched
        assert_eq!(resolved.controller.target, config.controller.target);

        let unresolved = config.resolve(None);
        assert_eq!(unresolved.controller.kp, 0.8);
    }
}
