//! Null-completion filter
//!
//! Rows whose history is too short carry `None` in at least one derived
//! field. They are dropped here, and the survivors become [`FeatureRecord`]s,
//! which have no optional fields at all.

use super::calendar::CalendarFeatures;
use super::reading::Reading;
use super::window::WindowedValues;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// A row before filtering
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub reading: Reading,
    pub calendar: CalendarFeatures,
    pub windowed: WindowedValues,
}

impl FeatureRow {
    pub fn new(reading: Reading, calendar: CalendarFeatures, windowed: WindowedValues) -> Self {
        Self {
            reading,
            calendar,
            windowed,
        }
    }

    /// Convert into a record if every derived field is present
    pub fn complete(self) -> Option<FeatureRecord> {
        let lags = self.windowed.lags.into_iter().collect::<Option<Vec<f64>>>()?;
        let rolling_mean = self.windowed.rolling_mean?;
        let rolling_std = self.windowed.rolling_std?;

        Some(FeatureRecord {
            timestamp: self.reading.timestamp,
            calendar: self.calendar,
            target_power: self.reading.power_mean,
            power_max: self.reading.power_max,
            power_min: self.reading.power_min,
            power_std: self.reading.power_std,
            voltage_mean: self.reading.voltage_mean,
            lags,
            rolling_mean,
            rolling_std,
        })
    }
}

/// A fully populated row of the feature table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub timestamp: NaiveDateTime,
    pub calendar: CalendarFeatures,
    pub target_power: f64,
    pub power_max: f64,
    pub power_min: f64,
    pub power_std: f64,
    pub voltage_mean: f64,
    /// One value per configured lag, in config order
    pub lags: Vec<f64>,
    pub rolling_mean: f64,
    pub rolling_std: f64,
}

impl FeatureRecord {
    /// Every value after the timestamp, in table column order
    pub fn numeric_values(&self) -> Vec<f64> {
        let c = &self.calendar;
        let mut values = Vec::with_capacity(13 + self.lags.len());
        values.extend([
            c.hour as f64,
            c.day_of_week as f64,
            c.day as f64,
            c.month as f64,
            c.year as f64,
            c.is_weekend as f64,
            self.target_power,
            self.power_max,
            self.power_min,
            self.power_std,
            self.voltage_mean,
        ]);
        values.extend_from_slice(&self.lags);
        values.push(self.rolling_mean);
        values.push(self.rolling_std);
        values
    }
}

/// Drop incomplete rows, logging how many were removed
pub fn complete_rows(rows: Vec<FeatureRow>) -> Vec<FeatureRecord> {
    let total = rows.len();
    let records: Vec<FeatureRecord> = rows.into_iter().filter_map(FeatureRow::complete).collect();
    let dropped = total - records.len();

    if let (Some(first), Some(last)) = (records.first(), records.last()) {
        debug!(first = %first.timestamp, last = %last.timestamp, "Completed feature range");
    }
    info!(total, kept = records.len(), dropped, "Dropped rows without full history");

    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeseries::calendar::parse_timestamp;

    fn row(lags: Vec<Option<f64>>, mean: Option<f64>, std: Option<f64>) -> FeatureRow {
        let ts = parse_timestamp("2007-01-01 00:00:00").unwrap();
        FeatureRow::new(
            Reading::new(ts, 1.5, 2.0, 1.0, 0.2, 240.0),
            CalendarFeatures::from_datetime(&ts),
            WindowedValues {
                lags,
                rolling_mean: mean,
                rolling_std: std,
            },
        )
    }

    #[test]
    fn test_complete_row_converts() {
        let record = row(vec![Some(1.0), Some(2.0)], Some(3.0), Some(0.5))
            .complete()
            .unwrap();
        assert_eq!(record.lags, vec![1.0, 2.0]);
        assert_eq!(record.target_power, 1.5);
        assert_eq!(record.rolling_std, 0.5);
    }

    #[test]
    fn test_any_missing_field_drops_row() {
        assert!(row(vec![None, Some(2.0)], Some(3.0), Some(0.5)).complete().is_none());
        assert!(row(vec![Some(1.0), Some(2.0)], None, Some(0.5)).complete().is_none());
        assert!(row(vec![Some(1.0), Some(2.0)], Some(3.0), None).complete().is_none());
    }

    #[test]
    fn test_complete_rows_keeps_order() {
        let rows = vec![
            row(vec![None], None, None),
            row(vec![Some(1.0)], Some(1.0), Some(0.0)),
            row(vec![Some(2.0)], Some(2.0), Some(0.0)),
        ];
        let records = complete_rows(rows);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].lags, vec![1.0]);
        assert_eq!(records[1].lags, vec![2.0]);
    }

    #[test]
    fn test_numeric_values_layout() {
        let record = row(vec![Some(7.0)], Some(8.0), Some(9.0)).complete().unwrap();
        let values = record.numeric_values();
        // 2007-01-01 was a Monday
        assert_eq!(&values[..6], &[0.0, 2.0, 1.0, 1.0, 2007.0, 0.0]);
        assert_eq!(&values[6..], &[1.5, 2.0, 1.0, 0.2, 240.0, 7.0, 8.0, 9.0]);
    }
}
