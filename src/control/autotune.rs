// src/control/autotune.rs - Relay-feedback auto-tuner (Ziegler-Nichols)
use std::f64::consts::PI;

use serde::Serialize;

/// Gains suggested by a completed relay experiment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TuningResult {
    /// Ultimate gain from the relay describing-function estimate.
    pub ku: f64,
    /// Ultimate period (seconds).
    pub tu: f64,
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
}

/// Relay auto-tuner estimating Ku/Tu for a slow thermal process.
///
/// While running it replaces the normal control law with a bang-bang relay
/// that offsets the setpoint by a fixed amplitude around the target. The
/// induced limit cycle is observed through sign changes of
/// (ambient - target); each change is recorded as a peak. Classic
/// Ziegler-Nichols rules map the measured oscillation to PID gains.
#[derive(Debug, Clone)]
pub struct RelayAutoTuner {
    amplitude: f64,
    peaks: Vec<(f64, f64)>,
    last_value: Option<f64>,
    relay_sign: f64,
    running: bool,
}

impl RelayAutoTuner {
    pub fn new(amplitude: f64) -> Self {
        Self {
            amplitude,
            peaks: Vec::new(),
            last_value: None,
            relay_sign: 1.0,
            running: false,
        }
    }

    /// Clear recorded state and begin a fresh relay experiment.
    pub fn start(&mut self) {
        self.peaks.clear();
        self.last_value = None;
        self.relay_sign = 1.0;
        self.running = true;
    }

    /// End the experiment. Recorded peaks are kept so `results` stays
    /// callable until the next `start`.
    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn peak_count(&self) -> usize {
        self.peaks.len()
    }

    /// Advance the relay one sample. Returns the commanded setpoint while
    /// running, or `target` unchanged when idle.
    pub fn step(&mut self, ambient: f64, target: f64, t: f64) -> f64 {
        if !self.running {
            return target;
        }

        // Bang-bang relay around the target
        self.relay_sign = if ambient > target { -1.0 } else { 1.0 };
        let commanded = target + self.relay_sign * self.amplitude;

        // Sign changes of (ambient - target) mark half cycles; zero counts
        // as positive so a sample sitting exactly on target does not flap.
        let sign = if ambient - target >= 0.0 { 1 } else { -1 };
        if let Some(last) = self.last_value {
            let last_sign = if last - target >= 0.0 { 1 } else { -1 };
            if sign != last_sign {
                self.peaks.push((t, ambient));
            }
        }
        self.last_value = Some(ambient);

        commanded
    }

    /// Estimate Ku/Tu from the recorded peaks and map them to PID gains
    /// with the classic Ziegler-Nichols rules. Returns `None` while the
    /// data is insufficient (fewer than 4 peaks, or no usable period).
    pub fn results(&self) -> Option<TuningResult> {
        if self.peaks.len() < 4 {
            return None;
        }

        // Same-sign peaks sit two indices apart, so every (i, i+2) delta
        // is one full period. Non-positive deltas are skipped.
        let ts: Vec<f64> = self.peaks.iter().map(|p| p.0).collect();
        let periods: Vec<f64> = (0..ts.len() - 2)
            .map(|i| ts[i + 2] - ts[i])
            .filter(|dt| *dt > 0.0)
            .collect();
        if periods.is_empty() {
            return None;
        }
        let tu = periods.iter().sum::<f64>() / periods.len() as f64;

        // Describing-function estimate; amplitude floored to avoid a
        // division by zero on a flat signal.
        let mean_amp = self.peaks.iter().map(|p| p.1.abs()).sum::<f64>() / self.peaks.len() as f64;
        let a = mean_amp.max(1e-6);
        let ku = (4.0 * self.amplitude) / (PI * a);

        let kp = 0.6 * ku;
        let ki = 2.0 * kp / tu;
        let kd = kp * tu / 8.0;

        Some(TuningResult { ku, tu, kp, ki, kd })
    }
}
