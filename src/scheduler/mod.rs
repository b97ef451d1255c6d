//! Daily automatic generation.
//!
//! [`schedule`] holds the pure time-of-day arithmetic; [`runner`] owns the
//! timer task that fires once per day.

pub mod runner;
pub mod schedule;

pub use runner::{DailyScheduler, FireCallback, SchedulerPhase, SchedulerStatus};
pub use schedule::{ScheduleConfig, TimeOfDay, next_fire_after, parse_timezone};
