// src/hardware/mod.rs - Collaborator seams for sensing, actuation and storage
pub mod store;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use store::JsonGainsStore;

/// One ambient-temperature sample from a sensor.
///
/// `Unavailable` covers an offline sensor, `Unknown` a sensor that reports
/// a state which is not a number. Both cause the control tick to be
/// skipped without escalating.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SensorReading {
    Value(f64),
    Unavailable,
    Unknown,
}

/// The only artifact that crosses into the actuator: a commanded setpoint
/// temperature plus an optional fan-mode override.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub temperature: f64,
    pub fan_mode: Option<String>,
}

#[derive(Debug, Error)]
pub enum ActuatorError {
    #[error("unsupported fan mode: {0}")]
    UnsupportedFanMode(String),
    #[error("actuator rejected command: {0}")]
    Rejected(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store format error: {0}")]
    Json(#[from] serde_json::Error),
}

/// PID gains persisted by a successful auto-tune run. Highest-precedence
/// configuration layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StoredGains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
}

/// Source of ambient-temperature readings.
#[async_trait]
pub trait SensorSource: Send + Sync {
    async fn read(&self, id: &str) -> SensorReading;
}

/// Sink for setpoint and fan-mode commands. Both calls are fire-and-forget
/// from the control loop's perspective: failures are logged by the caller
/// and never retried within the same tick.
#[async_trait]
pub trait ActuatorSink: Send + Sync {
    async fn set_temperature(&self, ids: &[String], value: f64) -> Result<(), ActuatorError>;
    async fn set_fan_mode(&self, ids: &[String], mode: &str) -> Result<(), ActuatorError>;
}

/// Persistence for auto-tuned gains across restarts.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn read_gains(&self) -> Result<Option<StoredGains>, StoreError>;
    async fn write_gains(&self, kp: f64, ki: f64, kd: f64) -> Result<(), StoreError>;
}
