//! Time ranges for statistics queries

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Time range a query is scoped to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TimeRange {
    /// Trailing window of `range_secs` ending when the query runs
    Relative { range_secs: i64 },
    /// Fixed window, both ends inclusive
    Absolute {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },
}

impl TimeRange {
    /// Trailing window of the given number of minutes
    pub fn trailing_minutes(minutes: i64) -> Result<Self, RangeError> {
        if minutes <= 0 {
            return Err(RangeError::InvalidParameters(format!(
                "trailing window must be positive, got {} minutes",
                minutes
            )));
        }
        let range_secs = minutes.checked_mul(60).ok_or_else(|| {
            RangeError::InvalidParameters(format!("{} minutes is out of range", minutes))
        })?;
        Self::relative(range_secs)
    }

    pub fn relative(range_secs: i64) -> Result<Self, RangeError> {
        if range_secs <= 0 {
            return Err(RangeError::InvalidParameters(format!(
                "relative range must be positive, got {} seconds",
                range_secs
            )));
        }
        // Reject anything chrono cannot subtract from "now"
        if Duration::try_seconds(range_secs).is_none() {
            return Err(RangeError::InvalidParameters(format!(
                "{} seconds is out of range",
                range_secs
            )));
        }
        Ok(TimeRange::Relative { range_secs })
    }

    pub fn absolute(from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Self, RangeError> {
        if from > to {
            return Err(RangeError::InvalidFormat(format!(
                "range start {} is after its end {}",
                from.to_rfc3339(),
                to.to_rfc3339()
            )));
        }
        Ok(TimeRange::Absolute { from, to })
    }

    /// Resolve the range into concrete `[from, to]` bounds
    pub fn bounds(&self, now: DateTime<Utc>) -> Result<(DateTime<Utc>, DateTime<Utc>), RangeError> {
        match *self {
            TimeRange::Relative { range_secs } => {
                let from = Duration::try_seconds(range_secs)
                    .and_then(|d| now.checked_sub_signed(d))
                    .ok_or_else(|| {
                        RangeError::InvalidFormat(format!(
                            "relative range of {} seconds is out of range",
                            range_secs
                        ))
                    })?;
                Ok((from, now))
            }
            TimeRange::Absolute { from, to } => {
                if from > to {
                    return Err(RangeError::InvalidFormat(format!(
                        "range start {} is after its end {}",
                        from.to_rfc3339(),
                        to.to_rfc3339()
                    )));
                }
                Ok((from, to))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RangeError {
    #[error("Invalid range parameters: {0}")]
    InvalidParameters(String),

    #[error("Invalid range format: {0}")]
    InvalidFormat(String),
}
