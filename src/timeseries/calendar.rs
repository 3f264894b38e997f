//! Calendar features derived from a reading's timestamp

use crate::error::{ForecastError, Result};
use chrono::{DateTime, Datelike, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

/// Format used when timestamps are written back out (feature table, logs).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Accepted naive layouts, tried in order.
const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// Calendar fields for one timestamp.
///
/// `day_of_week` runs 1..=7 starting on Sunday, so the weekend is {1, 7}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarFeatures {
    pub hour: u32,
    pub day_of_week: u32,
    pub day: u32,
    pub month: u32,
    pub year: i32,
    pub is_weekend: u32,
}

impl CalendarFeatures {
    /// Derive calendar fields from an already parsed timestamp.
    pub fn from_datetime(ts: &NaiveDateTime) -> Self {
        let day_of_week = ts.weekday().number_from_sunday();
        let is_weekend = u32::from(day_of_week == 1 || day_of_week == 7);

        Self {
            hour: ts.hour(),
            day_of_week,
            day: ts.day(),
            month: ts.month(),
            year: ts.year(),
            is_weekend,
        }
    }

    /// Parse a raw timestamp and derive its calendar fields.
    pub fn derive(raw: &str) -> Result<Self> {
        parse_timestamp(raw).map(|ts| Self::from_datetime(&ts))
    }
}

/// Parse a timestamp string.
///
/// Naive timestamps are taken as-is; RFC 3339 timestamps with an offset are
/// converted to UTC first.
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime> {
    let trimmed = raw.trim();

    for format in NAIVE_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(ts);
        }
    }

    DateTime::parse_from_rfc3339(trimmed)
        .map(|ts| ts.naive_utc())
        .map_err(|_| ForecastError::Parse(format!("unrecognized timestamp '{}'", raw)))
}

/// Render a timestamp the way the feature table stores it.
pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}
