//! Run-time and forecast-hour identifiers.
//!
//! `RunTime` and `ForecastHour` replace the teacher's combined `ValidTime`:
//! the pipeline treats the model-run instant and the forecast offset as
//! distinct values with distinct validation (a `ForecastHour` is only
//! meaningful relative to a `ModelConfig`'s `forecast_increment`/
//! `max_forecast_hour`, while a `RunTime` is meaningful on its own).

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The UTC issue time of a model run, truncated to a whole hour.
///
/// Immutable after creation. Formats on disk and in filenames as
/// `YYYYMMDD_HH`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RunTime(DateTime<Utc>);

impl RunTime {
    /// Truncate an instant to its containing run hour.
    pub fn new(instant: DateTime<Utc>) -> Self {
        let truncated = instant
            .with_minute(0)
            .and_then(|d| d.with_second(0))
            .and_then(|d| d.with_nanosecond(0))
            .unwrap_or(instant);
        Self(truncated)
    }

    pub fn from_ymd_hour(year: i32, month: u32, day: u32, hour: u32) -> Result<Self, TimeError> {
        Utc.with_ymd_and_hms(year, month, day, hour, 0, 0)
            .single()
            .map(Self)
            .ok_or(TimeError::InvalidRunTime { year, month, day, hour })
    }

    pub fn datetime(&self) -> DateTime<Utc> {
        self.0
    }

    pub fn hour(&self) -> u32 {
        self.0.hour()
    }

    /// `YYYYMMDD` date tag, UTC.
    pub fn date_tag(&self) -> String {
        self.0.format("%Y%m%d").to_string()
    }

    /// Two-digit hour tag, UTC.
    pub fn hour_tag(&self) -> String {
        self.0.format("%H").to_string()
    }

    /// `{YYYYMMDD}_{HH}` path/filename component, the on-disk naming
    /// convention used throughout the cache and publish directories.
    pub fn path_component(&self) -> String {
        format!("{}_{}", self.date_tag(), self.hour_tag())
    }
}

/// A non-negative forecast offset from a `RunTime`, in hours.
///
/// Validity against a model's `max_forecast_hour`/`forecast_increment` is
/// enforced by the caller (the Model Registry), not by this type, since
/// that validity is model-dependent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ForecastHour(u32);

impl ForecastHour {
    pub fn new(hours: u32) -> Self {
        Self(hours)
    }

    pub fn value(&self) -> u32 {
        self.0
    }

    /// Three-digit `FFF` tag used in cache keys and publish filenames.
    pub fn tag(&self) -> String {
        format!("{:03}", self.0)
    }

    /// `valid_time = RunTime + ForecastHour hours`.
    pub fn valid_time(&self, run: RunTime) -> DateTime<Utc> {
        run.datetime() + ChronoDuration::hours(self.0 as i64)
    }

    pub fn is_divisible_by(&self, increment: u32) -> bool {
        increment != 0 && self.0 % increment == 0
    }
}

#[derive(Debug, Error)]
pub enum TimeError {
    #[error("invalid run time {year:04}-{month:02}-{day:02} {hour:02}Z")]
    InvalidRunTime {
        year: i32,
        month: u32,
        day: u32,
        hour: u32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_time_truncates_to_whole_hour() {
        let instant = Utc.with_ymd_and_hms(2026, 2, 1, 6, 37, 12).unwrap();
        let run = RunTime::new(instant);
        assert_eq!(run.hour(), 6);
        assert_eq!(run.datetime().minute(), 0);
        assert_eq!(run.datetime().second(), 0);
    }

    #[test]
    fn path_component_matches_naming_convention() {
        let run = RunTime::from_ymd_hour(2026, 2, 1, 6).unwrap();
        assert_eq!(run.path_component(), "20260201_06");
    }

    #[test]
    fn forecast_hour_valid_time() {
        let run = RunTime::from_ymd_hour(2026, 2, 1, 6).unwrap();
        let fh = ForecastHour::new(12);
        assert_eq!(fh.tag(), "012");
        assert_eq!(fh.valid_time(run), run.datetime() + ChronoDuration::hours(12));
    }

    #[test]
    fn forecast_hour_divisibility() {
        assert!(ForecastHour::new(6).is_divisible_by(3));
        assert!(!ForecastHour::new(7).is_divisible_by(3));
    }
}
