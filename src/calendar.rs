//! UTC day arithmetic and the clock used to decide what "today" is

use crate::error::{FxError, Result};
use crate::types::{Day, DATE_FORMAT};
use chrono::{Duration, NaiveDate, Utc};
use std::fmt;

/// Source of the current UTC day
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current day in UTC
    fn today(&self) -> Day;

    /// Day before today
    fn yesterday(&self) -> Day {
        previous_day(self.today())
    }
}

/// Wall-clock UTC
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> Day {
        Utc::now().date_naive()
    }
}

/// Clock pinned to a fixed day (replays and tests)
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    today: Day,
}

impl FixedClock {
    pub fn new(today: Day) -> Self {
        Self { today }
    }
}

impl Clock for FixedClock {
    fn today(&self) -> Day {
        self.today
    }
}

pub fn next_day(day: Day) -> Day {
    day + Duration::days(1)
}

pub fn previous_day(day: Day) -> Day {
    day - Duration::days(1)
}

/// Parse a `YYYY-MM-DD` string
pub fn parse_date(s: &str) -> Result<Day> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
        .map_err(|e| FxError::ParseError(format!("Invalid date '{}': {}", s, e)))
}

/// Format a day as `YYYY-MM-DD`
pub fn format_date(day: Day) -> String {
    day.format(DATE_FORMAT).to_string()
}
