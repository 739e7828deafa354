// src/sim.rs - First-order thermal model of a room with an HVAC unit
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rand::Rng;

use crate::hardware::{ActuatorError, ActuatorSink, SensorReading, SensorSource};

const FAN_MODES: &[&str] = &["auto", "low", "quiet"];

#[derive(Debug)]
struct RoomState {
    temperature: f64,
    setpoint: f64,
    fan_mode: String,
}

/// Simulated room driving the closed loop end to end: the HVAC pulls the
/// room temperature toward the commanded setpoint while the outdoor
/// temperature leaks in through the walls.
#[derive(Debug, Clone)]
pub struct SimRoom {
    state: Arc<Mutex<RoomState>>,
    outdoor: f64,
    /// Sensor noise amplitude (uniform, degrees).
    noise: f64,
    /// HVAC coupling per second.
    hvac_rate: f64,
    /// Wall-leakage coupling per second.
    leak_rate: f64,
}

impl SimRoom {
    pub fn new(initial: f64, outdoor: f64, noise: f64) -> Self {
        Self {
            state: Arc::new(Mutex::new(RoomState {
                temperature: initial,
                setpoint: initial,
                fan_mode: "auto".to_string(),
            })),
            outdoor,
            noise,
            hvac_rate: 0.02,
            leak_rate: 0.002,
        }
    }

    /// Advance the model by `dt` seconds.
    pub fn advance(&self, dt: f64) {
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let toward_setpoint = (state.setpoint - state.temperature) * self.hvac_rate * dt;
        let toward_outdoor = (self.outdoor - state.temperature) * self.leak_rate * dt;
        state.temperature += toward_setpoint + toward_outdoor;
    }

    pub fn temperature(&self) -> f64 {
        match self.state.lock() {
            Ok(guard) => guard.temperature,
            Err(poisoned) => poisoned.into_inner().temperature,
        }
    }

    pub fn setpoint(&self) -> f64 {
        match self.state.lock() {
            Ok(guard) => guard.setpoint,
            Err(poisoned) => poisoned.into_inner().setpoint,
        }
    }

    pub fn fan_mode(&self) -> String {
        match self.state.lock() {
            Ok(guard) => guard.fan_mode.clone(),
            Err(poisoned) => poisoned.into_inner().fan_mode.clone(),
        }
    }
}

#[async_trait]
impl SensorSource for SimRoom {
    async fn read(&self, _id: &str) -> SensorReading {
        let temperature = self.temperature();
        let noisy = if self.noise > 0.0 {
            temperature + rand::rng().random_range(-self.noise..=self.noise)
        } else {
            temperature
        };
        SensorReading::Value(noisy)
    }
}

#[async_trait]
impl ActuatorSink for SimRoom {
    async fn set_temperature(&self, _ids: &[String], value: f64) -> Result<(), ActuatorError> {
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.setpoint = value;
        Ok(())
    }

    async fn set_fan_mode(&self, _ids: &[String], mode: &str) -> Result<(), ActuatorError> {
        if !FAN_MODES.contains(&mode) {
            return Err(ActuatorError::UnsupportedFanMode(mode.to_string()));
        }
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.fan_mode = mode.to_string();
        Ok(())
    }
}
