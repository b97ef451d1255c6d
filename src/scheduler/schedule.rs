//! Daily schedule definition and next-fire computation.

use chrono::offset::LocalResult;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{Result, StudioError};

/// Wall-clock time of day, minute resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeOfDay {
    /// Hour of day (0-23).
    pub hour: u8,
    /// Minute of hour (0-59).
    pub min: u8,
}

impl TimeOfDay {
    /// Build a time of day, rejecting out-of-range values.
    pub fn new(hour: u8, min: u8) -> Result<Self> {
        if hour > 23 || min > 59 {
            return Err(StudioError::Scheduler(format!(
                "invalid time of day {hour:02}:{min:02}"
            )));
        }
        Ok(Self { hour, min })
    }
}

impl std::fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.min)
    }
}

impl FromStr for TimeOfDay {
    type Err = StudioError;

    fn from_str(s: &str) -> Result<Self> {
        let bad = || StudioError::Scheduler(format!("expected HH:MM, got {s:?}"));
        let (h, m) = s.trim().split_once(':').ok_or_else(bad)?;
        let hour: u8 = h.parse().map_err(|_| bad())?;
        let min: u8 = m.parse().map_err(|_| bad())?;
        Self::new(hour, min)
    }
}

/// Parse an IANA zone name such as `"Europe/Berlin"` or `"UTC"`.
pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.trim()
        .parse::<Tz>()
        .map_err(|e| StudioError::Scheduler(format!("unknown timezone {name:?}: {e}")))
}

/// Schedule for the daily generation trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleConfig {
    /// Whether the trigger is registered at all.
    pub enabled: bool,
    /// Local time to fire at.
    pub time_of_day: TimeOfDay,
    /// Zone in which `time_of_day` is interpreted.
    pub timezone: Tz,
}

impl ScheduleConfig {
    /// Parse from the textual config values.
    pub fn parse(enabled: bool, time_of_day: &str, timezone: &str) -> Result<Self> {
        Ok(Self {
            enabled,
            time_of_day: time_of_day.parse()?,
            timezone: parse_timezone(timezone)?,
        })
    }
}

impl std::fmt::Display for ScheduleConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "daily at {} {}", self.time_of_day, self.timezone.name())
    }
}

/// Resolve `date` at `time` in `tz`.
///
/// Ambiguous times (clocks going back) use the earlier instant; times that
/// fall into a gap (clocks going forward) use the first valid minute after
/// the gap.
fn resolve_local(tz: Tz, date: NaiveDate, time: TimeOfDay) -> Option<DateTime<Tz>> {
    let mut naive: NaiveDateTime = date.and_hms_opt(u32::from(time.hour), u32::from(time.min), 0)?;
    for _ in 0..=(24 * 60) {
        match tz.from_local_datetime(&naive) {
            LocalResult::Single(t) => return Some(t),
            LocalResult::Ambiguous(earliest, _) => return Some(earliest),
            LocalResult::None => naive += Duration::minutes(1),
        }
    }
    None
}

/// First instant strictly after `after` at which `time` occurs in `tz`.
pub fn next_fire_after(after: DateTime<Utc>, time: TimeOfDay, tz: Tz) -> Option<DateTime<Tz>> {
    let local = after.with_timezone(&tz);
    let mut date = local.date_naive();
    for _ in 0..3 {
        if let Some(candidate) = resolve_local(tz, date, time) {
            if candidate.with_timezone(&Utc) > after {
                return Some(candidate);
            }
        }
        date = date.succ_opt()?;
    }
    None
}
