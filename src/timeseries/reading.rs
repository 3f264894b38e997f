//! Hourly meter readings, the input of the feature pipeline

use super::calendar::format_timestamp;
use crate::error::{ForecastError, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One aggregated reading of the meter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub timestamp: NaiveDateTime,
    /// Mean active power over the interval; the forecasting target
    pub power_mean: f64,
    pub power_max: f64,
    pub power_min: f64,
    pub power_std: f64,
    pub voltage_mean: f64,
}

impl Reading {
    pub fn new(
        timestamp: NaiveDateTime,
        power_mean: f64,
        power_max: f64,
        power_min: f64,
        power_std: f64,
        voltage_mean: f64,
    ) -> Self {
        Self {
            timestamp,
            power_mean,
            power_max,
            power_min,
            power_std,
            voltage_mean,
        }
    }

    /// Reject NaN or infinite measurements
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("power_mean", self.power_mean),
            ("power_max", self.power_max),
            ("power_min", self.power_min),
            ("power_std", self.power_std),
            ("voltage_mean", self.voltage_mean),
        ];
        match fields.iter().find(|(_, v)| !v.is_finite()) {
            Some((name, value)) => Err(ForecastError::Parse(format!(
                "non-finite {} {} at {}",
                name,
                value,
                format_timestamp(&self.timestamp)
            ))),
            None => Ok(()),
        }
    }
}

/// Source column names for each reading field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadingColumns {
    pub timestamp: String,
    pub power_mean: String,
    pub power_max: String,
    pub power_min: String,
    pub power_std: String,
    pub voltage_mean: String,
}

impl Default for ReadingColumns {
    fn default() -> Self {
        Self {
            timestamp: "datetime".to_string(),
            power_mean: "Global_active_power_mean".to_string(),
            power_max: "Global_active_power_max".to_string(),
            power_min: "Global_active_power_min".to_string(),
            power_std: "Global_active_power_std".to_string(),
            voltage_mean: "Voltage_mean".to_string(),
        }
    }
}

impl ReadingColumns {
    /// Numeric source columns, in `Reading` field order
    pub fn numeric(&self) -> [&str; 5] {
        [
            self.power_mean.as_str(),
            self.power_max.as_str(),
            self.power_min.as_str(),
            self.power_std.as_str(),
            self.voltage_mean.as_str(),
        ]
    }

    /// Override the timestamp column
    pub fn with_timestamp(mut self, name: impl Into<String>) -> Self {
        self.timestamp = name.into();
        self
    }

    /// Override the target column
    pub fn with_power_mean(mut self, name: impl Into<String>) -> Self {
        self.power_mean = name.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_non_finite() {
        let ts = NaiveDateTime::parse_from_str("2008-03-01 05:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
        assert!(Reading::new(ts, 1.0, 2.0, 0.5, 0.1, 240.0).validate().is_ok());

        let err = Reading::new(ts, 1.0, f64::INFINITY, 0.5, 0.1, 240.0)
            .validate()
            .unwrap_err();
        assert!(matches!(err, ForecastError::Parse(_)));
        assert!(err.to_string().contains("power_max"));
        assert!(err.to_string().contains("2008-03-01 05:00:00"));
    }
}
