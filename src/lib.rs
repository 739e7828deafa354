//! Smart PID thermostat: a closed-loop temperature controller.
//!
//! A periodic tick reads the ambient temperature and commands a corrected
//! setpoint through a PID law with deadband hold, output clamping and
//! rate-limited actuation. A relay-feedback auto-tuner can temporarily
//! replace the PID path to estimate gains via Ziegler-Nichols, and a
//! time-of-day scheduler applies night-setback/restore overrides through
//! the same actuator seam.

pub mod config;
pub mod control;
pub mod hardware;
pub mod runtime;
pub mod schedule;
pub mod sim;

pub use config::{Config, ConfigError, ControllerConfig, SetbackConfig, StoreConfig};
pub use control::{PidController, RelayAutoTuner, TuningResult};
pub use hardware::{
    ActuatorError, ActuatorSink, Command, ConfigStore, JsonGainsStore, SensorReading,
    SensorSource, StoreError, StoredGains,
};
pub use runtime::{ControlMode, ControllerRuntime, RuntimeStatus};
pub use schedule::{SchedulePhase, SetbackScheduler, next_occurrence, parse_hms, seconds_until};
pub use sim::SimRoom;
