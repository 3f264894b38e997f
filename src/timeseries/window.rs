//! Lag and trailing-window statistics over an ordered measurement sequence
//!
//! Offsets are counted in rows, not in wall-clock time: the engine assumes a
//! uniform sampling cadence and never gap-fills. A row whose history is too
//! short gets `None` for the affected fields.

use crate::error::{ForecastError, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Configuration for lag offsets and the rolling window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Lag offsets in rows
    pub lags: Vec<usize>,
    /// Width of the trailing window in rows (current row excluded)
    pub window: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            lags: vec![1, 24, 168],
            window: 168,
        }
    }
}

impl WindowConfig {
    /// Create a new config
    pub fn new(lags: Vec<usize>, window: usize) -> Self {
        Self { lags, window }
    }

    /// Check offsets and window width
    pub fn validate(&self) -> Result<()> {
        if self.lags.is_empty() {
            return Err(ForecastError::InvalidParameter {
                name: "lags".to_string(),
                value: "[]".to_string(),
                reason: "at least one lag offset is required".to_string(),
            });
        }
        if let Some(zero) = self.lags.iter().find(|&&lag| lag == 0) {
            return Err(ForecastError::InvalidParameter {
                name: "lags".to_string(),
                value: zero.to_string(),
                reason: "lag offsets must be at least 1".to_string(),
            });
        }
        if self.window < 2 {
            return Err(ForecastError::InvalidParameter {
                name: "window".to_string(),
                value: self.window.to_string(),
                reason: "sample standard deviation needs a window of at least 2".to_string(),
            });
        }
        Ok(())
    }

    /// Number of preceding rows a row needs before every field is defined
    pub fn required_history(&self) -> usize {
        self.lags.iter().copied().max().unwrap_or(0).max(self.window)
    }

    /// Column names for the lag fields, in config order
    pub fn lag_columns(&self) -> Vec<String> {
        self.lags.iter().map(|lag| format!("power_lag_{}h", lag)).collect()
    }

    /// Column name for the rolling mean
    pub fn rolling_mean_column(&self) -> String {
        format!("power_rolling_mean_{}", self.window_suffix())
    }

    /// Column name for the rolling standard deviation
    pub fn rolling_std_column(&self) -> String {
        format!("power_rolling_std_{}", self.window_suffix())
    }

    fn window_suffix(&self) -> String {
        if self.window % 24 == 0 {
            format!("{}d", self.window / 24)
        } else {
            format!("{}h", self.window)
        }
    }
}

/// Lag and rolling values computed for one row
#[derive(Debug, Clone, PartialEq)]
pub struct WindowedValues {
    /// One entry per configured lag, in config order
    pub lags: Vec<Option<f64>>,
    pub rolling_mean: Option<f64>,
    pub rolling_std: Option<f64>,
}

/// Mean and sample standard deviation of a window, summed oldest to newest.
///
/// Both the sequential and the parallel paths go through this function so
/// they agree to the bit.
fn window_stats<'a>(values: impl Iterator<Item = &'a f64> + Clone, n: usize) -> (f64, f64) {
    let count = n as f64;
    let mean = values.clone().sum::<f64>() / count;
    let variance = values.map(|v| (v - mean).powi(2)).sum::<f64>() / (count - 1.0);
    (mean, variance.sqrt())
}

/// Fixed-capacity ring buffer holding the most recent measurements.
///
/// `observe` reports the lag/rolling values for the incoming row *before*
/// that row enters the buffer, so the current value never leaks into its own
/// features. The same accumulator drives batch and online computation.
#[derive(Debug, Clone)]
pub struct WindowAccumulator {
    config: WindowConfig,
    capacity: usize,
    history: VecDeque<f64>,
}

impl WindowAccumulator {
    /// Create an accumulator for a validated config
    pub fn new(config: WindowConfig) -> Result<Self> {
        config.validate()?;
        let capacity = config.required_history();
        Ok(Self {
            config,
            capacity,
            history: VecDeque::with_capacity(capacity + 1),
        })
    }

    /// Compute the values for the next row, then record its measurement.
    pub fn observe(&mut self, value: f64) -> WindowedValues {
        let values = self.peek();
        self.history.push_back(value);
        if self.history.len() > self.capacity {
            self.history.pop_front();
        }
        values
    }

    /// Values the next row would receive, without recording anything.
    pub fn peek(&self) -> WindowedValues {
        let len = self.history.len();

        let lags = self
            .config
            .lags
            .iter()
            .map(|&lag| (lag <= len).then(|| self.history[len - lag]))
            .collect();

        let window = self.config.window;
        let (rolling_mean, rolling_std) = if len >= window {
            let (mean, std) = window_stats(self.history.iter().skip(len - window), window);
            (Some(mean), Some(std))
        } else {
            (None, None)
        };

        WindowedValues {
            lags,
            rolling_mean,
            rolling_std,
        }
    }

    /// Number of measurements currently retained
    pub fn len(&self) -> usize {
        self.history.len()
    }

    /// True before any measurement has been observed
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Whether the next row will have every field defined
    pub fn is_warm(&self) -> bool {
        self.history.len() >= self.capacity
    }

    pub fn config(&self) -> &WindowConfig {
        &self.config
    }
}

/// Batch lag/rolling computation over an ordered series
#[derive(Debug, Clone)]
pub struct WindowedStatistics {
    config: WindowConfig,
}

impl WindowedStatistics {
    pub fn new(config: WindowConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &WindowConfig {
        &self.config
    }

    /// Single sequential pass through a ring-buffer accumulator
    pub fn compute(&self, series: &[f64]) -> Result<Vec<WindowedValues>> {
        let mut accumulator = WindowAccumulator::new(self.config.clone())?;
        Ok(series.iter().map(|&value| accumulator.observe(value)).collect())
    }

    /// Parallel map over rows reading slice windows directly.
    ///
    /// Produces exactly the same values as [`WindowedStatistics::compute`].
    pub fn compute_par(&self, series: &[f64]) -> Vec<WindowedValues> {
        let window = self.config.window;

        (0..series.len())
            .into_par_iter()
            .map(|i| {
                let lags = self
                    .config
                    .lags
                    .iter()
                    .map(|&lag| (lag <= i).then(|| series[i - lag]))
                    .collect();

                let (rolling_mean, rolling_std) = if i >= window {
                    let (mean, std) = window_stats(series[i - window..i].iter(), window);
                    (Some(mean), Some(std))
                } else {
                    (None, None)
                };

                WindowedValues {
                    lags,
                    rolling_mean,
                    rolling_std,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(n: usize) -> Vec<f64> {
        (0..n).map(|i| i as f64).collect()
    }

    #[test]
    fn test_default_column_names() {
        let config = WindowConfig::default();
        assert_eq!(
            config.lag_columns(),
            vec!["power_lag_1h", "power_lag_24h", "power_lag_168h"]
        );
        assert_eq!(config.rolling_mean_column(), "power_rolling_mean_7d");
        assert_eq!(config.rolling_std_column(), "power_rolling_std_7d");
        assert_eq!(config.required_history(), 168);
    }

    #[test]
    fn test_hour_suffix_for_partial_days() {
        let config = WindowConfig::new(vec![2], 6);
        assert_eq!(config.rolling_mean_column(), "power_rolling_mean_6h");
        assert_eq!(config.lag_columns(), vec!["power_lag_2h"]);
    }

    #[test]
    fn test_invalid_configs() {
        assert!(WindowConfig::new(vec![], 4).validate().is_err());
        assert!(WindowConfig::new(vec![0, 1], 4).validate().is_err());
        assert!(WindowConfig::new(vec![1], 1).validate().is_err());
        assert!(WindowAccumulator::new(WindowConfig::new(vec![1], 0)).is_err());
    }

    #[test]
    fn test_lags_are_row_offsets() {
        let stats = WindowedStatistics::new(WindowConfig::new(vec![1, 2], 3)).unwrap();
        let out = stats.compute(&[10.0, 20.0, 30.0, 40.0]).unwrap();

        assert_eq!(out[0].lags, vec![None, None]);
        assert_eq!(out[1].lags, vec![Some(10.0), None]);
        assert_eq!(out[2].lags, vec![Some(20.0), Some(10.0)]);
        assert_eq!(out[3].lags, vec![Some(30.0), Some(20.0)]);
    }

    #[test]
    fn test_window_excludes_current_row() {
        let stats = WindowedStatistics::new(WindowConfig::new(vec![1], 3)).unwrap();
        let out = stats.compute(&[1.0, 2.0, 3.0, 100.0, 5.0]).unwrap();

        assert_eq!(out[2].rolling_mean, None);
        // Row 3 sees [1, 2, 3] only, not its own 100
        assert_eq!(out[3].rolling_mean, Some(2.0));
        assert!((out[3].rolling_std.unwrap() - 1.0).abs() < 1e-12);
        // Row 4 sees [2, 3, 100]
        assert!((out[4].rolling_mean.unwrap() - 35.0).abs() < 1e-12);
    }

    #[test]
    fn test_closed_form_ramp() {
        let stats = WindowedStatistics::new(WindowConfig::default()).unwrap();
        let out = stats.compute(&ramp(200)).unwrap();
        let expected_std = 2366.0_f64.sqrt();

        for (i, row) in out.iter().enumerate() {
            if i < 168 {
                assert_eq!(row.rolling_mean, None);
                continue;
            }
            let x = i as f64;
            assert_eq!(row.lags[0], Some(x - 1.0));
            assert_eq!(row.lags[1], Some(x - 24.0));
            assert_eq!(row.lags[2], Some(x - 168.0));
            assert!((row.rolling_mean.unwrap() - (x - 84.5)).abs() < 1e-9);
            assert!((row.rolling_std.unwrap() - expected_std).abs() < 1e-9);
        }
    }

    #[test]
    fn test_parallel_matches_sequential_bitwise() {
        let series: Vec<f64> = (0..600).map(|i| ((i * 37) % 101) as f64 * 0.173 + 0.5).collect();
        let stats = WindowedStatistics::new(WindowConfig::default()).unwrap();

        let sequential = stats.compute(&series).unwrap();
        let parallel = stats.compute_par(&series);

        assert_eq!(sequential.len(), parallel.len());
        for (a, b) in sequential.iter().zip(parallel.iter()) {
            assert_eq!(a.lags, b.lags);
            assert_eq!(a.rolling_mean.map(f64::to_bits), b.rolling_mean.map(f64::to_bits));
            assert_eq!(a.rolling_std.map(f64::to_bits), b.rolling_std.map(f64::to_bits));
        }
    }

    #[test]
    fn test_accumulator_warmup_and_capacity() {
        let mut acc = WindowAccumulator::new(WindowConfig::new(vec![1, 4], 3)).unwrap();
        assert!(acc.is_empty());
        for v in 0..4 {
            assert!(!acc.is_warm());
            acc.observe(v as f64);
        }
        assert!(acc.is_warm());

        for v in 4..20 {
            acc.observe(v as f64);
        }
        assert_eq!(acc.len(), 4);

        let next = acc.peek();
        assert_eq!(next.lags, vec![Some(19.0), Some(16.0)]);
        assert_eq!(next.rolling_mean, Some(18.0));
    }
}
