//! Forecast timestamp handling.

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::{ForecastError, ForecastResult};

/// Timestamp format used by the forecast batch metadata.
pub const FORECAST_TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H:%M:%S";

/// Parse a "YYYY-MM-DD_HH:MM:SS" timestamp.
pub fn parse_forecast_timestamp(s: &str) -> ForecastResult<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s.trim(), FORECAST_TIMESTAMP_FORMAT)
        .map_err(|_| ForecastError::InvalidTimestamp(s.to_string()))
}

/// Valid-time range of a forecast dataset.
///
/// Time indices `0..total_timesteps` are spread evenly from `initial` to
/// `last`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastTimeRange {
    pub initial: NaiveDateTime,
    pub last: NaiveDateTime,
    pub total_timesteps: usize,
}

impl ForecastTimeRange {
    pub fn parse(initial: &str, last: &str, total_timesteps: usize) -> ForecastResult<Self> {
        if total_timesteps > i32::MAX as usize {
            return Err(ForecastError::InvalidTimestamp(format!(
                "{} timesteps exceeds {}",
                total_timesteps,
                i32::MAX
            )));
        }
        let range = Self {
            initial: parse_forecast_timestamp(initial)?,
            last: parse_forecast_timestamp(last)?,
            total_timesteps,
        };
        if range.last < range.initial {
            return Err(ForecastError::InvalidTimestamp(format!(
                "final timestamp {} precedes initial {}",
                last, initial
            )));
        }
        Ok(range)
    }

    /// Spacing between consecutive time indices.
    pub fn step(&self) -> Duration {
        if self.total_timesteps < 2 {
            return Duration::zero();
        }
        Duration::milliseconds(self.step_ms())
    }

    fn step_ms(&self) -> i64 {
        if self.total_timesteps < 2 {
            return 0;
        }
        let intervals = i64::try_from(self.total_timesteps - 1).unwrap_or(i64::MAX);
        (self.last - self.initial).num_milliseconds() / intervals
    }

    /// Wall-clock valid time for a time index.
    pub fn valid_time(&self, time_index: i64) -> Option<NaiveDateTime> {
        if time_index < 0 || time_index as usize >= self.total_timesteps.max(1) {
            return None;
        }
        let offset = self.step_ms().checked_mul(time_index)?;
        self.initial
            .checked_add_signed(Duration::try_milliseconds(offset)?)
    }
}
