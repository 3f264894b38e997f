//! Training configuration

use super::random_forest::MaxFeatures;
use crate::error::{ForecastError, Result};
use crate::timeseries::{TARGET_COLUMN, TIMESTAMP_COLUMN};
use serde::{Deserialize, Serialize};

/// Type of model to train
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    /// Random Forest
    RandomForest,
    /// Single decision tree
    DecisionTree,
}

/// Configuration for model training
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Model type to train
    pub model_type: ModelType,

    /// Target column name
    pub target_column: String,

    /// Columns that identify a row but are not features
    pub identifier_columns: Vec<String>,

    /// Fraction of rows held out, taken from the end of the series
    pub test_fraction: f64,

    /// Random seed for reproducibility
    pub random_state: Option<u64>,

    // Tree-specific parameters
    /// Number of trees (for ensemble methods)
    pub n_estimators: usize,

    /// Maximum depth of trees
    pub max_depth: Option<usize>,

    /// Minimum samples to split a node
    pub min_samples_split: usize,

    /// Minimum samples per leaf
    pub min_samples_leaf: usize,

    /// Features considered per split
    pub max_features: MaxFeatures,

    /// Bootstrap rows for each tree
    pub bootstrap: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            model_type: ModelType::RandomForest,
            target_column: TARGET_COLUMN.to_string(),
            identifier_columns: vec![TIMESTAMP_COLUMN.to_string(), "year".to_string()],
            test_fraction: 0.2,
            random_state: Some(42),
            n_estimators: 100,
            max_depth: Some(20),
            min_samples_split: 10,
            min_samples_leaf: 5,
            max_features: MaxFeatures::All,
            bootstrap: true,
        }
    }
}

impl TrainingConfig {
    /// Create a new training config
    pub fn new() -> Self {
        Self::default()
    }

    /// Set model type
    pub fn with_model_type(mut self, model_type: ModelType) -> Self {
        self.model_type = model_type;
        self
    }

    /// Set the held-out fraction
    pub fn with_test_fraction(mut self, fraction: f64) -> Self {
        self.test_fraction = fraction;
        self
    }

    /// Set number of trees
    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n;
        self
    }

    /// Set maximum tree depth
    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    /// Set minimum samples to split
    pub fn with_min_samples_split(mut self, n: usize) -> Self {
        self.min_samples_split = n;
        self
    }

    /// Set minimum samples per leaf
    pub fn with_min_samples_leaf(mut self, n: usize) -> Self {
        self.min_samples_leaf = n;
        self
    }

    /// Set random seed
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Columns excluded from the feature contract
    pub fn excluded_columns(&self) -> Vec<String> {
        let mut excluded = self.identifier_columns.clone();
        excluded.push(self.target_column.clone());
        excluded
    }

    /// Check parameter ranges
    pub fn validate(&self) -> Result<()> {
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(ForecastError::Config(format!(
                "test_fraction must lie strictly between 0 and 1, got {}",
                self.test_fraction
            )));
        }
        if self.model_type == ModelType::RandomForest && self.n_estimators == 0 {
            return Err(ForecastError::Config("n_estimators must be at least 1".to_string()));
        }
        if self.min_samples_leaf == 0 {
            return Err(ForecastError::Config("min_samples_leaf must be at least 1".to_string()));
        }
        if self.identifier_columns.contains(&self.target_column) {
            return Err(ForecastError::Config(format!(
                "target column '{}' is also listed as an identifier",
                self.target_column
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TrainingConfig::default();
        assert_eq!(config.n_estimators, 100);
        assert_eq!(config.max_depth, Some(20));
        assert_eq!(config.min_samples_split, 10);
        assert_eq!(config.min_samples_leaf, 5);
        assert_eq!(config.random_state, Some(42));
        assert_eq!(config.excluded_columns(), vec!["timestamp", "year", "target_power"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid() {
        assert!(TrainingConfig::new().with_test_fraction(0.0).validate().is_err());
        assert!(TrainingConfig::new().with_n_estimators(0).validate().is_err());
        assert!(TrainingConfig::new().with_min_samples_leaf(0).validate().is_err());
    }
}
