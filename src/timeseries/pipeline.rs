//! Readings to feature table
//!
//! Sorting by timestamp is a hard barrier: windowing only ever sees an
//! ordered, duplicate-free sequence.

use super::calendar::{format_timestamp, CalendarFeatures};
use super::filter::{complete_rows, FeatureRecord, FeatureRow};
use super::reading::Reading;
use super::table::FeatureTable;
use super::window::{WindowAccumulator, WindowConfig, WindowedStatistics};
use crate::error::{ForecastError, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::info;

/// Feature pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureConfig {
    pub window: WindowConfig,
    /// Use the parallel window pass
    pub parallel: bool,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            parallel: true,
        }
    }
}

impl FeatureConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the lag and rolling window configuration
    pub fn with_window(mut self, window: WindowConfig) -> Self {
        self.window = window;
        self
    }

    /// Toggle the parallel window pass
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}

/// Batch feature computation over a full set of readings
#[derive(Debug, Clone)]
pub struct FeaturePipeline {
    config: FeatureConfig,
    statistics: WindowedStatistics,
}

impl FeaturePipeline {
    pub fn new(config: FeatureConfig) -> Result<Self> {
        let statistics = WindowedStatistics::new(config.window.clone())?;
        Ok(Self { config, statistics })
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    /// Sort, window and filter readings into a feature table
    pub fn run(&self, mut readings: Vec<Reading>) -> Result<FeatureTable> {
        let start = Instant::now();
        let n_readings = readings.len();

        readings.iter().try_for_each(Reading::validate)?;
        sort_by_timestamp(&mut readings, |r| r.timestamp)?;

        let series: Vec<f64> = readings.iter().map(|r| r.power_mean).collect();
        let windowed = if self.config.parallel {
            self.statistics.compute_par(&series)
        } else {
            self.statistics.compute(&series)?
        };

        let rows: Vec<FeatureRow> = readings
            .into_iter()
            .zip(windowed)
            .map(|(reading, values)| {
                let calendar = CalendarFeatures::from_datetime(&reading.timestamp);
                FeatureRow::new(reading, calendar, values)
            })
            .collect();

        let records = complete_rows(rows);

        info!(
            readings = n_readings,
            records = records.len(),
            parallel = self.config.parallel,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Feature table built"
        );

        FeatureTable::new(self.config.window.clone(), records)
    }
}

/// Sort ascending by timestamp, rejecting duplicates
pub fn sort_by_timestamp<T>(items: &mut [T], timestamp: impl Fn(&T) -> NaiveDateTime) -> Result<()> {
    items.sort_by_key(|item| timestamp(item));

    if let Some(pair) = items.windows(2).find(|w| timestamp(&w[0]) == timestamp(&w[1])) {
        return Err(ForecastError::Parse(format!(
            "duplicate timestamp {}",
            format_timestamp(&timestamp(&pair[0]))
        )));
    }
    Ok(())
}

/// Online feature computation, one reading at a time.
///
/// Uses the same accumulator as the batch path, so a series fed through
/// here yields the same records as [`FeaturePipeline::run`].
#[derive(Debug, Clone)]
pub struct StreamingFeatures {
    accumulator: WindowAccumulator,
    last_timestamp: Option<NaiveDateTime>,
}

impl StreamingFeatures {
    pub fn new(config: WindowConfig) -> Result<Self> {
        Ok(Self {
            accumulator: WindowAccumulator::new(config)?,
            last_timestamp: None,
        })
    }

    /// Feed the next reading; returns a record once history is sufficient.
    ///
    /// Readings must arrive in strictly increasing timestamp order.
    pub fn push(&mut self, reading: Reading) -> Result<Option<FeatureRecord>> {
        reading.validate()?;
        if let Some(last) = self.last_timestamp {
            if reading.timestamp <= last {
                return Err(ForecastError::Parse(format!(
                    "reading at {} does not follow {}",
                    format_timestamp(&reading.timestamp),
                    format_timestamp(&last)
                )));
            }
        }
        self.last_timestamp = Some(reading.timestamp);

        let values = self.accumulator.observe(reading.power_mean);
        let calendar = CalendarFeatures::from_datetime(&reading.timestamp);
        Ok(FeatureRow::new(reading, calendar, values).complete())
    }

    /// Whether the next pushed reading will produce a record
    pub fn is_warm(&self) -> bool {
        self.accumulator.is_warm()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn hourly(n: usize) -> Vec<Reading> {
        let base = NaiveDateTime::parse_from_str("2007-01-01 00:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
        (0..n)
            .map(|i| {
                let x = i as f64;
                Reading::new(
                    base + Duration::hours(i as i64),
                    x,
                    x + 1.0,
                    x - 1.0,
                    0.1,
                    240.0,
                )
            })
            .collect()
    }

    #[test]
    fn test_drops_warmup_rows() {
        let pipeline = FeaturePipeline::new(FeatureConfig::default()).unwrap();
        let table = pipeline.run(hourly(200)).unwrap();
        assert_eq!(table.len(), 32);
        assert_eq!(table.records()[0].lags, vec![167.0, 144.0, 0.0]);
    }

    #[test]
    fn test_unsorted_input_is_sorted_first() {
        let pipeline = FeaturePipeline::new(FeatureConfig::default().with_parallel(false)).unwrap();
        let sorted = pipeline.run(hourly(180)).unwrap();

        let mut shuffled = hourly(180);
        shuffled.reverse();
        shuffled.swap(3, 90);
        let from_shuffled = pipeline.run(shuffled).unwrap();

        assert_eq!(sorted.records(), from_shuffled.records());
    }

    #[test]
    fn test_duplicate_timestamp_rejected() {
        let mut readings = hourly(10);
        readings[7].timestamp = readings[2].timestamp;
        let err = FeaturePipeline::new(FeatureConfig::default())
            .unwrap()
            .run(readings)
            .unwrap_err();
        assert!(matches!(err, ForecastError::Parse(_)));
        assert!(err.to_string().contains("2007-01-01 02:00:00"));
    }

    #[test]
    fn test_short_series_yields_empty_table() {
        let table = FeaturePipeline::new(FeatureConfig::default())
            .unwrap()
            .run(hourly(100))
            .unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn test_streaming_matches_batch() {
        let readings = hourly(260);
        let batch = FeaturePipeline::new(FeatureConfig::default())
            .unwrap()
            .run(readings.clone())
            .unwrap();

        let mut streaming = StreamingFeatures::new(WindowConfig::default()).unwrap();
        let mut online = Vec::new();
        for reading in readings {
            if let Some(record) = streaming.push(reading).unwrap() {
                online.push(record);
            }
        }

        assert_eq!(batch.records(), online.as_slice());
    }

    #[test]
    fn test_streaming_rejects_out_of_order() {
        let readings = hourly(3);
        let mut streaming = StreamingFeatures::new(WindowConfig::new(vec![1], 2)).unwrap();
        streaming.push(readings[1]).unwrap();
        assert!(streaming.push(readings[0]).is_err());
        assert!(streaming.push(readings[1]).is_err());
        assert!(streaming.push(readings[2]).unwrap().is_none());
    }

    #[test]
    fn test_non_finite_reading_rejected() {
        let mut readings = hourly(200);
        readings[120].power_mean = f64::NAN;

        let err = FeaturePipeline::new(FeatureConfig::default())
            .unwrap()
            .run(readings.clone())
            .unwrap_err();
        assert!(matches!(err, ForecastError::Parse(_)));

        let mut streaming = StreamingFeatures::new(WindowConfig::default()).unwrap();
        let pushed: Result<Vec<_>> = readings.into_iter().map(|r| streaming.push(r)).collect();
        assert!(pushed.is_err());
    }
}
