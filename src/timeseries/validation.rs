//! Chronological hold-out split
//!
//! The test partition is always the tail of the series. Rows are never
//! shuffled, so no future observation leaks into training.

use crate::error::{ForecastError, Result};
use ndarray::{s, Array1, Array2};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Train and test row ranges over a time-ordered dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoldoutSplit {
    /// Training indices
    pub train: Range<usize>,
    /// Held-out indices, always ending at the last row
    pub test: Range<usize>,
}

impl HoldoutSplit {
    pub fn n_train(&self) -> usize {
        self.train.len()
    }

    pub fn n_test(&self) -> usize {
        self.test.len()
    }

    /// Slice features and target into (x_train, y_train, x_test, y_test)
    pub fn apply(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
    ) -> (Array2<f64>, Array1<f64>, Array2<f64>, Array1<f64>) {
        let (train, test) = (self.train.clone(), self.test.clone());
        (
            x.slice(s![train.clone(), ..]).to_owned(),
            y.slice(s![train]).to_owned(),
            x.slice(s![test.clone(), ..]).to_owned(),
            y.slice(s![test]).to_owned(),
        )
    }
}

/// Hold out the last `ceil(test_fraction * n)` rows.
///
/// Both partitions must end up non-empty.
pub fn holdout_split(n_samples: usize, test_fraction: f64) -> Result<HoldoutSplit> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(ForecastError::InvalidParameter {
            name: "test_fraction".to_string(),
            value: test_fraction.to_string(),
            reason: "must lie strictly between 0 and 1".to_string(),
        });
    }

    let n_test = (test_fraction * n_samples as f64).ceil() as usize;
    if n_test >= n_samples {
        return Err(ForecastError::Data(format!(
            "{} rows are too few for a {} hold-out split",
            n_samples, test_fraction
        )));
    }

    let n_train = n_samples - n_test;
    Ok(HoldoutSplit {
        train: 0..n_train,
        test: n_train..n_samples,
    })
}
