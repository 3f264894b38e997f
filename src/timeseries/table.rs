//! Persisted feature table
//!
//! Column order is fixed: `timestamp`, the calendar fields, the target and
//! the raw aggregates, then the lag columns and the rolling pair. Tables are
//! written as one or more Parquet shards named `part-NNNNN.parquet`.

use super::calendar::{format_timestamp, parse_timestamp, CalendarFeatures};
use super::filter::FeatureRecord;
use super::pipeline::sort_by_timestamp;
use super::window::WindowConfig;
use crate::error::{ForecastError, Result};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use rayon::prelude::*;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const TIMESTAMP_COLUMN: &str = "timestamp";
pub const TARGET_COLUMN: &str = "target_power";

const CALENDAR_COLUMNS: [&str; 6] = ["hour", "day_of_week", "day", "month", "year", "is_weekend"];
const MEASUREMENT_COLUMNS: [&str; 5] = [
    TARGET_COLUMN,
    "power_max",
    "power_min",
    "power_std",
    "voltage_mean",
];

const LAG_PREFIX: &str = "power_lag_";
const ROLLING_MEAN_PREFIX: &str = "power_rolling_mean_";

/// Ordered column names of a table built with `window`
pub fn feature_columns(window: &WindowConfig) -> Vec<String> {
    let mut columns = vec![TIMESTAMP_COLUMN.to_string()];
    columns.extend(CALENDAR_COLUMNS.iter().map(|c| c.to_string()));
    columns.extend(MEASUREMENT_COLUMNS.iter().map(|c| c.to_string()));
    columns.extend(window.lag_columns());
    columns.push(window.rolling_mean_column());
    columns.push(window.rolling_std_column());
    columns
}

/// Recover the window configuration from a table's column names
fn window_from_columns(columns: &[String]) -> Result<WindowConfig> {
    let lags = columns
        .iter()
        .filter_map(|c| c.strip_prefix(LAG_PREFIX))
        .map(|suffix| {
            suffix
                .strip_suffix('h')
                .and_then(|k| k.parse::<usize>().ok())
                .ok_or_else(|| ForecastError::Parse(format!("bad lag column '{}{}'", LAG_PREFIX, suffix)))
        })
        .collect::<Result<Vec<usize>>>()?;

    let suffix = columns
        .iter()
        .find_map(|c| c.strip_prefix(ROLLING_MEAN_PREFIX))
        .ok_or_else(|| ForecastError::Parse("feature table has no rolling mean column".to_string()))?;

    let window = if let Some(days) = suffix.strip_suffix('d') {
        days.parse::<usize>().ok().map(|d| d * 24)
    } else {
        suffix.strip_suffix('h').and_then(|h| h.parse::<usize>().ok())
    }
    .ok_or_else(|| ForecastError::Parse(format!("bad rolling column suffix '{}'", suffix)))?;

    Ok(WindowConfig::new(lags, window))
}

/// Completed feature rows with their schema, ordered by timestamp
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    window: WindowConfig,
    columns: Vec<String>,
    records: Vec<FeatureRecord>,
}

impl FeatureTable {
    /// Wrap records built with `window`. Records must already be in order.
    pub fn new(window: WindowConfig, records: Vec<FeatureRecord>) -> Result<Self> {
        window.validate()?;
        if let Some((i, bad)) = records
            .iter()
            .enumerate()
            .find(|(_, r)| r.lags.len() != window.lags.len())
        {
            return Err(ForecastError::Shape {
                expected: format!("{} lag values", window.lags.len()),
                actual: format!("{} in record {}", bad.lags.len(), i),
            });
        }
        let columns = feature_columns(&window);
        Ok(Self {
            window,
            columns,
            records,
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn records(&self) -> &[FeatureRecord] {
        &self.records
    }

    pub fn window(&self) -> &WindowConfig {
        &self.window
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Project the table onto `columns`, in the given order
    pub fn matrix(&self, columns: &[String]) -> Result<Array2<f64>> {
        // numeric_values() starts after the timestamp column
        let indices = columns
            .iter()
            .map(|name| {
                self.columns
                    .iter()
                    .skip(1)
                    .position(|c| c == name)
                    .ok_or_else(|| ForecastError::Data(format!("column '{}' not in feature table", name)))
            })
            .collect::<Result<Vec<usize>>>()?;

        let rows: Vec<Vec<f64>> = self
            .records
            .par_iter()
            .map(|record| {
                let values = record.numeric_values();
                indices.iter().map(|&i| values[i]).collect()
            })
            .collect();

        let flat: Vec<f64> = rows.into_iter().flatten().collect();
        Ok(Array2::from_shape_vec((self.records.len(), columns.len()), flat)?)
    }

    /// The target column
    pub fn target(&self) -> Array1<f64> {
        self.records.iter().map(|r| r.target_power).collect()
    }

    /// Convert to a polars DataFrame in table column order
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let timestamps: Vec<String> = self
            .records
            .iter()
            .map(|r| format_timestamp(&r.timestamp))
            .collect();

        let ints = |name: &str, get: fn(&CalendarFeatures) -> i32| {
            let values: Vec<i32> = self.records.iter().map(|r| get(&r.calendar)).collect();
            Column::new(name.into(), values)
        };
        let floats = |name: &str, values: Vec<f64>| Column::new(name.into(), values);
        let pick = |get: fn(&FeatureRecord) -> f64| self.records.iter().map(get).collect::<Vec<f64>>();

        let mut columns = vec![
            Column::new(TIMESTAMP_COLUMN.into(), timestamps),
            ints("hour", |c| c.hour as i32),
            ints("day_of_week", |c| c.day_of_week as i32),
            ints("day", |c| c.day as i32),
            ints("month", |c| c.month as i32),
            ints("year", |c| c.year),
            ints("is_weekend", |c| c.is_weekend as i32),
            floats(TARGET_COLUMN, pick(|r| r.target_power)),
            floats("power_max", pick(|r| r.power_max)),
            floats("power_min", pick(|r| r.power_min)),
            floats("power_std", pick(|r| r.power_std)),
            floats("voltage_mean", pick(|r| r.voltage_mean)),
        ];
        for (k, name) in self.window.lag_columns().iter().enumerate() {
            columns.push(floats(name.as_str(), self.records.iter().map(|r| r.lags[k]).collect()));
        }
        columns.push(floats(self.window.rolling_mean_column().as_str(), pick(|r| r.rolling_mean)));
        columns.push(floats(self.window.rolling_std_column().as_str(), pick(|r| r.rolling_std)));

        Ok(DataFrame::new(columns)?)
    }

    /// Rebuild a table from a DataFrame with the fixed column layout.
    ///
    /// Rows are sorted by timestamp; duplicates, nulls and schema mismatches
    /// are parse errors.
    pub fn from_dataframe(df: &DataFrame) -> Result<Self> {
        let names: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|c| c.as_str().to_string())
            .collect();

        let window = window_from_columns(&names)?;
        window.validate()?;
        let expected = feature_columns(&window);
        if names != expected {
            return Err(ForecastError::Parse(format!(
                "feature table columns {:?} do not match expected layout {:?}",
                names, expected
            )));
        }

        let timestamps = string_column(df, TIMESTAMP_COLUMN)?
            .iter()
            .map(|raw| parse_timestamp(raw))
            .collect::<Result<Vec<_>>>()?;
        let calendar: Vec<Vec<i32>> = CALENDAR_COLUMNS
            .iter()
            .map(|name| int_column(df, name))
            .collect::<Result<_>>()?;
        let measurements: Vec<Vec<f64>> = MEASUREMENT_COLUMNS
            .iter()
            .map(|name| float_column(df, name))
            .collect::<Result<_>>()?;
        let lags: Vec<Vec<f64>> = window
            .lag_columns()
            .iter()
            .map(|name| float_column(df, name))
            .collect::<Result<_>>()?;
        let rolling_mean = float_column(df, &window.rolling_mean_column())?;
        let rolling_std = float_column(df, &window.rolling_std_column())?;

        let mut records: Vec<FeatureRecord> = timestamps
            .into_iter()
            .enumerate()
            .map(|(i, timestamp)| {
                let stored = stored_calendar(&calendar, i)?;
                if stored != CalendarFeatures::from_datetime(&timestamp) {
                    return Err(ForecastError::Parse(format!(
                        "calendar fields at row {} do not match timestamp {}",
                        i,
                        format_timestamp(&timestamp)
                    )));
                }
                Ok(FeatureRecord {
                    timestamp,
                    calendar: stored,
                    target_power: measurements[0][i],
                    power_max: measurements[1][i],
                    power_min: measurements[2][i],
                    power_std: measurements[3][i],
                    voltage_mean: measurements[4][i],
                    lags: lags.iter().map(|column| column[i]).collect(),
                    rolling_mean: rolling_mean[i],
                    rolling_std: rolling_std[i],
                })
            })
            .collect::<Result<_>>()?;

        sort_by_timestamp(&mut records, |r| r.timestamp)?;
        Self::new(window, records)
    }

    /// Write the table as Parquet shards of at most `shard_rows` rows.
    ///
    /// Existing `part-*.parquet` files in `dir` are replaced.
    pub fn write_shards(&self, dir: &Path, shard_rows: usize) -> Result<Vec<PathBuf>> {
        if shard_rows == 0 {
            return Err(ForecastError::InvalidParameter {
                name: "shard_rows".to_string(),
                value: "0".to_string(),
                reason: "shards must hold at least one row".to_string(),
            });
        }
        fs::create_dir_all(dir)?;
        for stale in shard_paths(dir)? {
            debug!(path = %stale.display(), "Removing stale shard");
            fs::remove_file(stale)?;
        }

        let df = self.to_dataframe()?;
        let n_shards = self.len().div_ceil(shard_rows).max(1);
        let mut written = Vec::with_capacity(n_shards);

        for shard in 0..n_shards {
            let mut part = df.slice((shard * shard_rows) as i64, shard_rows);
            let path = dir.join(format!("part-{:05}.parquet", shard));
            let mut file = File::create(&path)?;
            ParquetWriter::new(&mut file).finish(&mut part)?;
            written.push(path);
        }

        info!(
            rows = self.len(),
            shards = written.len(),
            dir = %dir.display(),
            "Feature table written"
        );
        Ok(written)
    }

    /// Read every Parquet shard in `dir`, concatenated and ordered by timestamp
    pub fn read_dir(dir: &Path) -> Result<Self> {
        let paths = shard_paths(dir)?;
        if paths.is_empty() {
            return Err(ForecastError::Data(format!(
                "no parquet shards found in {}",
                dir.display()
            )));
        }

        let mut combined: Option<DataFrame> = None;
        for path in &paths {
            let df = ParquetReader::new(File::open(path)?).finish()?;
            debug!(path = %path.display(), rows = df.height(), "Read shard");
            match combined.as_mut() {
                Some(acc) => {
                    acc.vstack_mut(&df)?;
                }
                None => combined = Some(df),
            }
        }

        let df = combined.ok_or_else(|| ForecastError::Data("empty shard list".to_string()))?;
        let table = Self::from_dataframe(&df)?;
        info!(shards = paths.len(), rows = table.len(), "Feature table loaded");
        Ok(table)
    }
}

/// Parquet files in `dir`, sorted by name
fn shard_paths(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "parquet"))
        .collect();
    paths.sort();
    Ok(paths)
}

fn null_error(column: &str, row: usize) -> ForecastError {
    ForecastError::Parse(format!("null or non-numeric value in column '{}' at row {}", column, row))
}

fn require<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Series> {
    df.column(name)
        .map(|c| c.as_materialized_series())
        .map_err(|_| ForecastError::Parse(format!("missing column '{}'", name)))
}

/// Numeric column as finite `f64`; nulls, NaN and infinities are parse errors
pub(crate) fn float_column(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let series = require(df, name)?.cast(&DataType::Float64)?;
    series
        .f64()?
        .into_iter()
        .enumerate()
        .map(|(i, v)| match v {
            Some(x) if x.is_finite() => Ok(x),
            Some(x) => Err(ForecastError::Parse(format!(
                "non-finite value {} in column '{}' at row {}",
                x, name, i
            ))),
            None => Err(null_error(name, i)),
        })
        .collect()
}

/// Integer column; fractional or out-of-range values are parse errors
fn int_column(df: &DataFrame, name: &str) -> Result<Vec<i32>> {
    float_column(df, name)?
        .into_iter()
        .enumerate()
        .map(|(i, x)| {
            if x.fract() == 0.0 && x >= i32::MIN as f64 && x <= i32::MAX as f64 {
                Ok(x as i32)
            } else {
                Err(ForecastError::Parse(format!(
                    "non-integer value {} in column '{}' at row {}",
                    x, name, i
                )))
            }
        })
        .collect()
}

/// Calendar fields of row `i`, in `CALENDAR_COLUMNS` order
fn stored_calendar(columns: &[Vec<i32>], i: usize) -> Result<CalendarFeatures> {
    let field = |k: usize| {
        u32::try_from(columns[k][i]).map_err(|_| {
            ForecastError::Parse(format!(
                "negative value {} in column '{}' at row {}",
                columns[k][i], CALENDAR_COLUMNS[k], i
            ))
        })
    };
    Ok(CalendarFeatures {
        hour: field(0)?,
        day_of_week: field(1)?,
        day: field(2)?,
        month: field(3)?,
        year: columns[4][i],
        is_weekend: field(5)?,
    })
}

pub(crate) fn string_column(df: &DataFrame, name: &str) -> Result<Vec<String>> {
    let series = require(df, name)?.cast(&DataType::String)?;
    series
        .str()?
        .into_iter()
        .enumerate()
        .map(|(i, v)| v.map(str::to_string).ok_or_else(|| null_error(name, i)))
        .collect()
}
