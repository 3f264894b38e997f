//! Readings loader

use crate::error::{ForecastError, Result};
use crate::timeseries::calendar::parse_timestamp;
use crate::timeseries::reading::{Reading, ReadingColumns};
use crate::timeseries::table::{float_column, string_column};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use std::time::Instant;
use tracing::info;

/// Loads hourly readings from CSV
#[derive(Debug, Clone)]
pub struct DataLoader {
    /// Source column names
    columns: ReadingColumns,
    /// Rows scanned for schema inference
    infer_schema_length: usize,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    /// Create a loader for the default column layout
    pub fn new() -> Self {
        Self {
            columns: ReadingColumns::default(),
            infer_schema_length: 1000,
        }
    }

    /// Set source column names
    pub fn with_columns(mut self, columns: ReadingColumns) -> Self {
        self.columns = columns;
        self
    }

    /// Set schema inference length
    pub fn with_infer_schema_length(mut self, rows: usize) -> Self {
        self.infer_schema_length = rows.max(1);
        self
    }

    /// Load a CSV file into a DataFrame
    pub fn load_csv(&self, path: &Path) -> Result<DataFrame> {
        let file = File::open(path)?;

        let reader = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(self.infer_schema_length))
            .into_reader_with_file_handle(file);

        reader
            .finish()
            .map_err(|e| ForecastError::Parse(format!("{}: {}", path.display(), e)))
    }

    /// Load readings from a CSV file
    pub fn load_readings(&self, path: &Path) -> Result<Vec<Reading>> {
        let start = Instant::now();
        let df = self.load_csv(path)?;
        let readings = self.readings_from_dataframe(&df)?;

        info!(
            path = %path.display(),
            rows = readings.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Loaded readings"
        );
        Ok(readings)
    }

    /// Convert a DataFrame into readings.
    ///
    /// Missing columns, nulls, non-numeric values and malformed timestamps
    /// are all parse errors.
    pub fn readings_from_dataframe(&self, df: &DataFrame) -> Result<Vec<Reading>> {
        let timestamps = string_column(df, &self.columns.timestamp)?
            .iter()
            .map(|raw| parse_timestamp(raw))
            .collect::<Result<Vec<_>>>()?;

        let [mean, max, min, std, voltage] = self.columns.numeric();
        let power_mean = float_column(df, mean)?;
        let power_max = float_column(df, max)?;
        let power_min = float_column(df, min)?;
        let power_std = float_column(df, std)?;
        let voltage_mean = float_column(df, voltage)?;

        Ok(timestamps
            .into_iter()
            .enumerate()
            .map(|(i, ts)| {
                Reading::new(
                    ts,
                    power_mean[i],
                    power_max[i],
                    power_min[i],
                    power_std[i],
                    voltage_mean[i],
                )
            })
            .collect())
    }
}
