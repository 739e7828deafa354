// src/runtime.rs - Control loop orchestration
use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::config::{Config, ConfigError};
use crate::control::{PidController, RelayAutoTuner, TuningResult};
use crate::hardware::{ActuatorSink, ConfigStore, SensorReading, SensorSource};
use crate::schedule::SetbackScheduler;

/// Which algorithm governs the control tick. Auto-tune replaces the PID
/// path entirely while active; deadband, bounds and rate limiting are
/// bypassed so the relay can drive its limit cycle unimpeded.
#[derive(Debug)]
pub enum ControlMode {
    Normal,
    Autotune(RelayAutoTuner),
}

/// Snapshot of the runtime for status reporting.
#[derive(Debug, Clone, Serialize)]
pub struct RuntimeStatus {
    pub enabled: bool,
    pub mode: String,
    pub target: f64,
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    pub integral: f64,
    pub last_ambient: Option<f64>,
    pub last_output: Option<f64>,
    pub last_setpoint: f64,
}

/// Owns the per-tick decision logic and all mutable control state.
///
/// Entry points (`tick`, `on_setback`, `on_restore`, `start_autotune`,
/// `stop_autotune`, `update_config`, `set_enabled`) are invoked one at a
/// time by the host; the runtime itself holds no locks and relies on that
/// serialization guarantee.
pub struct ControllerRuntime {
    cfg: Config,
    pid: PidController,
    mode: ControlMode,
    enabled: bool,
    scheduler: Option<SetbackScheduler>,

    /// Rate-limit memory; seeded from the target so the very first command
    /// cannot jump arbitrarily far either.
    last_setpoint: f64,
    last_ambient: Option<f64>,
    last_output: Option<f64>,

    sensor: Arc<dyn SensorSource>,
    actuator: Arc<dyn ActuatorSink>,
    store: Arc<dyn ConfigStore>,
}

impl ControllerRuntime {
    /// Build a runtime from a validated file configuration, merging in any
    /// gains a previous auto-tune persisted. A store read failure only
    /// costs the stored layer, not startup.
    pub async fn new(
        file_cfg: Config,
        sensor: Arc<dyn SensorSource>,
        actuator: Arc<dyn ActuatorSink>,
        store: Arc<dyn ConfigStore>,
    ) -> Result<Self, ConfigError> {
        file_cfg.validate()?;

        let stored = match store.read_gains().await {
            Ok(gains) => gains,
            Err(e) => {
                tracing::warn!("Could not read stored gains, using file values: {}", e);
                None
            }
        };
        let cfg = file_cfg.resolve(stored.as_ref());

        let pid = Self::build_pid(&cfg);
        let scheduler = SetbackScheduler::from_config(&cfg.setback)?;
        let last_setpoint = cfg.controller.target;

        tracing::info!(
            "Controller \"{}\" ready: target={:.1}, kp={:.4}, ki={:.4}, kd={:.4}",
            cfg.controller.name,
            cfg.controller.target,
            cfg.controller.kp,
            cfg.controller.ki,
            cfg.controller.kd
        );

        Ok(Self {
            cfg,
            pid,
            mode: ControlMode::Normal,
            enabled: true,
            scheduler,
            last_setpoint,
            last_ambient: None,
            last_output: None,
            sensor,
            actuator,
            store,
        })
    }

    /// The PID output is a correction around the target, so its bounds are
    /// the distance from the target to each temperature limit. The
    /// clamped correction then always maps into [min_temp, max_temp].
    fn build_pid(cfg: &Config) -> PidController {
        let c = &cfg.controller;
        PidController::new(
            c.kp,
            c.ki,
            c.kd,
            Some(c.min_temp - c.target),
            Some(c.max_temp - c.target),
        )
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_autotuning(&self) -> bool {
        matches!(self.mode, ControlMode::Autotune(_))
    }

    pub fn pid_integral(&self) -> f64 {
        self.pid.integral()
    }

    pub fn last_setpoint(&self) -> f64 {
        self.last_setpoint
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        if self.enabled != enabled {
            tracing::info!(
                "Controller {}",
                if enabled { "enabled" } else { "disabled" }
            );
        }
        self.enabled = enabled;
    }

    /// One control tick at monotonic time `now` (seconds).
    pub async fn tick(&mut self, now: f64) {
        if !self.enabled {
            return;
        }

        let ambient = match self.sensor.read(&self.cfg.controller.sensor).await {
            SensorReading::Value(v) if v.is_finite() => v,
            reading => {
                tracing::debug!(
                    "Sensor {} gave no usable value ({:?}), skipping tick",
                    self.cfg.controller.sensor,
                    reading
                );
                return;
            }
        };
        self.last_ambient = Some(ambient);

        let target = self.cfg.controller.target;

        if let ControlMode::Autotune(tuner) = &mut self.mode {
            let commanded = tuner.step(ambient, target, now);
            tracing::debug!(
                "Autotune tick: ambient={:.2}, commanded={:.2}, peaks={}",
                ambient,
                commanded,
                tuner.peak_count()
            );
            self.dispatch_temperature(commanded).await;
            return;
        }

        let error = target - ambient;
        if error.abs() <= self.cfg.controller.deadband {
            // Hold inside the dead zone; reset so the integral cannot
            // drift while no action is taken.
            self.pid.reset();
            return;
        }

        let output = self.pid.update(error, now);
        self.last_output = Some(output);

        let c = &self.cfg.controller;
        let candidate = (target + output).clamp(c.min_temp, c.max_temp);
        let limited = candidate.clamp(
            self.last_setpoint - c.max_step,
            self.last_setpoint + c.max_step,
        );
        self.last_setpoint = limited;

        tracing::debug!(
            "Tick: ambient={:.2}, error={:.2}, output={:.3}, setpoint={:.2}",
            ambient,
            error,
            output,
            limited
        );
        self.dispatch_temperature(limited).await;
    }

    /// Begin a relay auto-tune experiment, replacing any previous tuner.
    pub fn start_autotune(&mut self) {
        let mut tuner = RelayAutoTuner::new(self.cfg.controller.autotune_amplitude);
        tuner.start();
        tracing::info!(
            "Auto-tune started (amplitude {:.2})",
            self.cfg.controller.autotune_amplitude
        );
        self.mode = ControlMode::Autotune(tuner);
    }

    /// End the auto-tune experiment. With enough recorded data the
    /// suggested gains are rounded, persisted and applied to the live PID
    /// controller; otherwise nothing changes. Idempotent: a second call
    /// with no active tuner returns `None`.
    pub async fn stop_autotune(&mut self) -> Option<TuningResult> {
        let mode = std::mem::replace(&mut self.mode, ControlMode::Normal);
        let mut tuner = match mode {
            ControlMode::Autotune(tuner) => tuner,
            ControlMode::Normal => return None,
        };
        tuner.stop();

        let result = tuner.results();
        match &result {
            Some(res) => {
                let kp = round4(res.kp);
                let ki = round4(res.ki);
                let kd = round4(res.kd);
                tracing::info!(
                    "Auto-tune complete: Ku={:.4}, Tu={:.1}s -> kp={}, ki={}, kd={}",
                    res.ku,
                    res.tu,
                    kp,
                    ki,
                    kd
                );
                if let Err(e) = self.store.write_gains(kp, ki, kd).await {
                    tracing::error!("Failed to persist tuned gains: {}", e);
                }
                self.cfg.controller.kp = kp;
                self.cfg.controller.ki = ki;
                self.cfg.controller.kd = kd;
                self.pid.set_gains(kp, ki, kd);
            }
            None => {
                tracing::warn!(
                    "Auto-tune stopped with insufficient data ({} peaks), gains unchanged",
                    tuner.peak_count()
                );
            }
        }
        result
    }

    /// Re-resolve the layered configuration from a freshly loaded file and
    /// the stored gains, then re-apply it to the live components.
    pub async fn update_config(&mut self, file_cfg: Config) -> Result<(), ConfigError> {
        file_cfg.validate()?;

        let stored = match self.store.read_gains().await {
            Ok(gains) => gains,
            Err(e) => {
                tracing::warn!("Could not read stored gains during update: {}", e);
                None
            }
        };
        let cfg = file_cfg.resolve(stored.as_ref());

        let c = &cfg.controller;
        self.pid.set_gains(c.kp, c.ki, c.kd);
        self.pid
            .set_output_limits(Some(c.min_temp - c.target), Some(c.max_temp - c.target));
        self.scheduler = SetbackScheduler::from_config(&cfg.setback)?;
        self.last_setpoint = self
            .last_setpoint
            .clamp(c.min_temp, c.max_temp);
        tracing::info!(
            "Configuration updated: target={:.1}, kp={:.4}, ki={:.4}, kd={:.4}",
            c.target,
            c.kp,
            c.ki,
            c.kd
        );
        self.cfg = cfg;
        Ok(())
    }

    /// Nightly setback trigger, fired once per day by the host timer.
    pub async fn on_setback(&mut self, now: NaiveDateTime) {
        let Some(scheduler) = &mut self.scheduler else {
            return;
        };
        let cmd = scheduler.on_setback(now);
        tracing::info!("Night setback: commanding {:.1}", cmd.temperature);
        self.dispatch_temperature(cmd.temperature).await;
    }

    /// Morning restore trigger, fired once per day by the host timer.
    pub async fn on_restore(&mut self, now: NaiveDateTime) {
        let Some(scheduler) = &mut self.scheduler else {
            return;
        };
        let cmd = scheduler.on_restore(now);
        tracing::info!("Morning restore: commanding {:.1}", cmd.temperature);
        self.dispatch_temperature(cmd.temperature).await;
        if let Some(fan) = cmd.fan_mode {
            self.dispatch_fan_mode(&fan).await;
        }
    }

    pub fn status(&self) -> RuntimeStatus {
        let c = &self.cfg.controller;
        let pid = self.pid.status();
        RuntimeStatus {
            enabled: self.enabled,
            mode: match self.mode {
                ControlMode::Normal => "pid".to_string(),
                ControlMode::Autotune(_) => "autotune".to_string(),
            },
            target: c.target,
            kp: pid.kp,
            ki: pid.ki,
            kd: pid.kd,
            integral: pid.integral,
            last_ambient: self.last_ambient,
            last_output: self.last_output,
            last_setpoint: self.last_setpoint,
        }
    }

    // Fire-and-forget dispatch; failures are logged, never surfaced.
    async fn dispatch_temperature(&self, value: f64) {
        let c = &self.cfg.controller;
        if let Err(e) = self.actuator.set_temperature(&c.actuators, value).await {
            tracing::warn!("Setpoint dispatch failed: {}", e);
        }
    }

    // Fan-mode support varies between actuators; a rejection is expected
    // often enough to stay at debug level.
    async fn dispatch_fan_mode(&self, mode: &str) {
        let c = &self.cfg.controller;
        if let Err(e) = self.actuator.set_fan_mode(&c.actuators, mode).await {
            tracing::debug!("Fan mode set failed (maybe unsupported): {}", e);
        }
    }
}

fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}
