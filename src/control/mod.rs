// src/control/mod.rs - Control algorithms (PID law and relay auto-tuner)
pub mod autotune;
pub mod pid;

pub use autotune::{RelayAutoTuner, TuningResult};
pub use pid::PidController;
