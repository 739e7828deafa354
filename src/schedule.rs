// src/schedule.rs - Night setback / morning restore scheduling
use chrono::{Days, NaiveDateTime, NaiveTime};

use crate::config::{ConfigError, SetbackConfig};
use crate::hardware::Command;

/// Which daily transition fires next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulePhase {
    Normal,
    Setback,
}

/// Time-of-day state machine for the two daily override events.
///
/// The scheduler only decides what command each transition issues and keeps
/// track of which phase it is in; the daily recurrence and exactly-once
/// guarantee belong to the timer that invokes `on_setback`/`on_restore`.
#[derive(Debug, Clone)]
pub struct SetbackScheduler {
    setback_time: NaiveTime,
    restore_time: NaiveTime,
    setback_temp: f64,
    restore_temp: f64,
    restore_fan: Option<String>,

    phase: SchedulePhase,
    last_setback: Option<NaiveDateTime>,
    last_restore: Option<NaiveDateTime>,
}

impl SetbackScheduler {
    /// Build a scheduler from the validated setback section. Returns `None`
    /// when setback is disabled; malformed time strings are fatal.
    pub fn from_config(cfg: &SetbackConfig) -> Result<Option<Self>, ConfigError> {
        if !cfg.enabled {
            return Ok(None);
        }
        let setback_time = parse_hms(&cfg.setback_time)?;
        let restore_time = parse_hms(&cfg.restore_time)?;
        Ok(Some(Self {
            setback_time,
            restore_time,
            setback_temp: cfg.setback_temp,
            restore_temp: cfg.restore_temp,
            restore_fan: cfg.restore_fan.clone(),
            phase: SchedulePhase::Normal,
            last_setback: None,
            last_restore: None,
        }))
    }

    pub fn phase(&self) -> SchedulePhase {
        self.phase
    }

    pub fn setback_time(&self) -> NaiveTime {
        self.setback_time
    }

    pub fn restore_time(&self) -> NaiveTime {
        self.restore_time
    }

    pub fn last_setback(&self) -> Option<NaiveDateTime> {
        self.last_setback
    }

    pub fn last_restore(&self) -> Option<NaiveDateTime> {
        self.last_restore
    }

    /// Nightly transition: drop to the setback temperature.
    pub fn on_setback(&mut self, now: NaiveDateTime) -> Command {
        self.phase = SchedulePhase::Setback;
        self.last_setback = Some(now);
        Command {
            temperature: self.setback_temp,
            fan_mode: None,
        }
    }

    /// Morning transition: restore the comfort temperature and, when
    /// configured, the fan mode.
    pub fn on_restore(&mut self, now: NaiveDateTime) -> Command {
        self.phase = SchedulePhase::Normal;
        self.last_restore = Some(now);
        Command {
            temperature: self.restore_temp,
            fan_mode: self.restore_fan.clone(),
        }
    }
}

/// Parse an "HH:MM:SS" style string; missing trailing components default
/// to zero. Malformed input is a configuration error, detected at startup.
pub fn parse_hms(s: &str) -> Result<NaiveTime, ConfigError> {
    let bad = || ConfigError::BadTime(s.to_string());
    let mut parts = [0u32; 3];
    let fields: Vec<&str> = s.split(':').collect();
    if fields.is_empty() || fields.len() > 3 {
        return Err(bad());
    }
    for (i, field) in fields.iter().enumerate() {
        parts[i] = field.trim().parse::<u32>().map_err(|_| bad())?;
    }
    NaiveTime::from_hms_opt(parts[0], parts[1], parts[2]).ok_or_else(bad)
}

/// The next wall-clock instant at which `at` occurs strictly after `after`:
/// today if still ahead, otherwise tomorrow. Used to arm the daily timers.
pub fn next_occurrence(after: NaiveDateTime, at: NaiveTime) -> NaiveDateTime {
    let today = after.date().and_time(at);
    if today > after {
        today
    } else {
        today
            .checked_add_days(Days::new(1))
            .unwrap_or(today)
    }
}

/// Seconds until the next occurrence of `at`, for timer arming.
pub fn seconds_until(after: NaiveDateTime, at: NaiveTime) -> u64 {
    let next = next_occurrence(after, at);
    (next - after).num_seconds().max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dt(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 8, 26)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn test_parse_full_hms() {
        assert_eq!(
            parse_hms("23:00:00").unwrap(),
            NaiveTime::from_hms_opt(23, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_parse_missing_components_default_to_zero() {
        assert_eq!(
            parse_hms("6:30").unwrap(),
            NaiveTime::from_hms_opt(6, 30, 0).unwrap()
        );
        assert_eq!(
            parse_hms("7").unwrap(),
            NaiveTime::from_hms_opt(7, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_parse_rejects_malformed_strings() {
        assert!(parse_hms("").is_err());
        assert!(parse_hms("25:00:00").is_err());
        assert!(parse_hms("12:61").is_err());
        assert!(parse_hms("noon").is_err());
        assert!(parse_hms("1:2:3:4").is_err());
    }

    #[test]
    fn test_next_occurrence_today_and_tomorrow() {
        let at = NaiveTime::from_hms_opt(23, 0, 0).unwrap();
        assert_eq!(next_occurrence(dt(12, 0, 0), at), dt(23, 0, 0));
        // already past: next is tomorrow
        let next = next_occurrence(dt(23, 30, 0), at);
        assert_eq!(next.date(), dt(0, 0, 0).date().succ_opt().unwrap());
        assert_eq!(next.time(), at);
    }

    #[test]
    fn test_transitions_issue_configured_commands() {
        let cfg = SetbackConfig {
            enabled: true,
            setback_time: "23:00:00".to_string(),
            setback_temp: 18.0,
            restore_time: "06:30:00".to_string(),
            restore_temp: 23.0,
            restore_fan: Some("low".to_string()),
        };
        let mut sched = SetbackScheduler::from_config(&cfg).unwrap().unwrap();
        assert_eq!(sched.phase(), SchedulePhase::Normal);

        let cmd = sched.on_setback(dt(23, 0, 0));
        assert_eq!(cmd.temperature, 18.0);
        assert_eq!(cmd.fan_mode, None);
        assert_eq!(sched.phase(), SchedulePhase::Setback);

        let cmd = sched.on_restore(dt(6, 30, 0));
        assert_eq!(cmd.temperature, 23.0);
        assert_eq!(cmd.fan_mode.as_deref(), Some("low"));
        assert_eq!(sched.phase(), SchedulePhase::Normal);
        assert!(sched.last_setback().is_some());
        assert!(sched.last_restore().is_some());
    }

    #[test]
    fn test_disabled_setback_builds_no_scheduler() {
        let cfg = SetbackConfig {
            enabled: false,
            ..SetbackConfig::default()
        };
        assert!(SetbackScheduler::from_config(&cfg).unwrap().is_none());
    }
}
