// src/control/pid.rs - PID control law with irregular-timestep support
use serde::Serialize;

/// PID controller operating on an error signal with explicit timestamps.
///
/// Timestamps are monotonic seconds supplied by the caller, so the control
/// loop can be driven by a real clock or by a test harness. The integral
/// uses clamp-only anti-windup: accumulation is never frozen, the output is
/// clamped to the optional bounds after summing. Under sustained saturation
/// the integral can still wind up; this mirrors the output-clamp strategy
/// the controller was designed with and is a documented limitation.
#[derive(Debug, Clone)]
pub struct PidController {
    kp: f64,
    ki: f64,
    kd: f64,
    out_min: Option<f64>,
    out_max: Option<f64>,

    integral: f64,
    last_error: Option<f64>,
    last_t: Option<f64>,
}

/// Snapshot of the controller for status reporting.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PidStatus {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    pub integral: f64,
}

impl PidController {
    pub fn new(kp: f64, ki: f64, kd: f64, out_min: Option<f64>, out_max: Option<f64>) -> Self {
        Self {
            kp,
            ki,
            kd,
            out_min,
            out_max,
            integral: 0.0,
            last_error: None,
            last_t: None,
        }
    }

    /// Replace the gains without disturbing the accumulated state.
    pub fn set_gains(&mut self, kp: f64, ki: f64, kd: f64) {
        self.kp = kp;
        self.ki = ki;
        self.kd = kd;
    }

    /// Replace the output bounds (applied from the next update onward).
    pub fn set_output_limits(&mut self, out_min: Option<f64>, out_max: Option<f64>) {
        self.out_min = out_min;
        self.out_max = out_max;
    }

    pub fn gains(&self) -> (f64, f64, f64) {
        (self.kp, self.ki, self.kd)
    }

    pub fn integral(&self) -> f64 {
        self.integral
    }

    /// Clear all accumulated state. Used when the loop enters a deadband
    /// hold so the integral cannot drift while no action is taken.
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.last_error = None;
        self.last_t = None;
    }

    /// Compute the control output for `error` observed at time `t` (seconds).
    ///
    /// The first call uses dt = 1.0 since there is no previous sample;
    /// afterwards dt is floored at 1 ms so clock jitter can never divide
    /// by zero. The derivative term is zero on the first call.
    pub fn update(&mut self, error: f64, t: f64) -> f64 {
        let dt = match self.last_t {
            Some(last) => (t - last).max(1e-3),
            None => 1.0,
        };
        self.last_t = Some(t);

        let p = self.kp * error;

        self.integral += self.ki * error * dt;

        let d = match self.last_error {
            Some(last) => self.kd * (error - last) / dt,
            None => 0.0,
        };
        self.last_error = Some(error);

        let mut out = p + self.integral + d;
        if let Some(min) = self.out_min {
            out = out.max(min);
        }
        if let Some(max) = self.out_max {
            out = out.min(max);
        }
        out
    }

    pub fn status(&self) -> PidStatus {
        PidStatus {
            kp: self.kp,
            ki: self.ki,
            kd: self.kd,
            integral: self.integral,
        }
    }
}
