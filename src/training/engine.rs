//! Training engine implementation

use super::artifact::ModelArtifact;
use super::config::{ModelType, TrainingConfig};
use super::decision_tree::DecisionTree;
use super::metrics::RegressionMetrics;
use super::models::{Regressor, TrainedModel};
use super::random_forest::RandomForest;
use crate::error::{ForecastError, Result};
use crate::inference::FeatureContract;
use crate::timeseries::{holdout_split, FeatureTable};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

/// File name of the metrics report inside the output directory
pub const METRICS_FILE: &str = "metrics.json";

/// Importance of one contract column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

/// Evaluation summary written to `metrics.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub train_rmse: f64,
    pub train_mae: f64,
    pub train_r2: f64,
    pub test_rmse: f64,
    pub test_mae: f64,
    pub test_r2: f64,
    pub n_train: usize,
    pub n_test: usize,
    /// Sorted by importance, highest first
    pub feature_importance: Vec<FeatureImportance>,
}

impl TrainingReport {
    fn new(
        train: RegressionMetrics,
        test: RegressionMetrics,
        feature_importance: Vec<FeatureImportance>,
    ) -> Self {
        Self {
            train_rmse: train.rmse,
            train_mae: train.mae,
            train_r2: train.r2,
            test_rmse: test.rmse,
            test_mae: test.mae,
            test_r2: test.r2,
            n_train: train.n_samples,
            n_test: test.n_samples,
            feature_importance,
        }
    }

    /// Whether every metric is a finite number
    pub fn is_finite(&self) -> bool {
        [
            self.train_rmse,
            self.train_mae,
            self.train_r2,
            self.test_rmse,
            self.test_mae,
            self.test_r2,
        ]
        .iter()
        .chain(self.feature_importance.iter().map(|f| &f.importance))
        .all(|v| v.is_finite())
    }

    /// Write the report as `metrics.json` in `dir`
    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(METRICS_FILE);
        let mut writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(path)
    }
}

/// Main training engine
#[derive(Debug, Clone)]
pub struct TrainEngine {
    config: TrainingConfig,
    contract: Option<FeatureContract>,
    model: Option<TrainedModel>,
    report: Option<TrainingReport>,
}

impl TrainEngine {
    /// Create a new training engine
    pub fn new(config: TrainingConfig) -> Self {
        Self {
            config,
            contract: None,
            model: None,
            report: None,
        }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Build the contract, split chronologically, fit and evaluate
    pub fn fit(&mut self, table: &FeatureTable) -> Result<TrainingReport> {
        let start = Instant::now();
        self.config.validate()?;

        if !table.columns().contains(&self.config.target_column) {
            return Err(ForecastError::Training(format!(
                "target column '{}' not in feature table",
                self.config.target_column
            )));
        }

        let contract = FeatureContract::from_schema(table.columns(), &self.config.excluded_columns())?;
        let x = table.matrix(contract.columns())?;
        let y = table
            .matrix(std::slice::from_ref(&self.config.target_column))?
            .column(0)
            .to_owned();

        let split = holdout_split(x.nrows(), self.config.test_fraction)?;
        let (x_train, y_train, x_test, y_test) = split.apply(&x, &y);
        info!(
            rows = x.nrows(),
            features = contract.len(),
            n_train = split.n_train(),
            n_test = split.n_test(),
            "Training data prepared"
        );

        let mut model = self.build_model();
        model.fit(&x_train, &y_train)?;
        debug!(model = model.name(), elapsed_ms = start.elapsed().as_millis() as u64, "Model fitted");

        let train = RegressionMetrics::compute(&y_train, &model.predict(&x_train)?)?;
        let test = RegressionMetrics::compute(&y_test, &model.predict(&x_test)?)?;

        let mut importance: Vec<FeatureImportance> = match model.feature_importances() {
            Some(values) => contract
                .columns()
                .iter()
                .zip(values.iter())
                .map(|(feature, &importance)| FeatureImportance {
                    feature: feature.clone(),
                    importance,
                })
                .collect(),
            None => Vec::new(),
        };
        importance.sort_by(|a, b| b.importance.total_cmp(&a.importance));

        let report = TrainingReport::new(train, test, importance);
        if !report.is_finite() {
            return Err(ForecastError::Training(
                "evaluation produced non-finite metrics".to_string(),
            ));
        }
        info!(
            train_rmse = report.train_rmse,
            test_rmse = report.test_rmse,
            test_mae = report.test_mae,
            test_r2 = report.test_r2,
            elapsed_secs = start.elapsed().as_secs_f64(),
            "Training complete"
        );

        self.contract = Some(contract);
        self.model = Some(model);
        self.report = Some(report.clone());
        Ok(report)
    }

    fn build_model(&self) -> TrainedModel {
        let c = &self.config;
        let seed = c.random_state.unwrap_or(42);
        match c.model_type {
            ModelType::RandomForest => {
                let mut forest = RandomForest::new(c.n_estimators)
                    .with_min_samples_split(c.min_samples_split)
                    .with_min_samples_leaf(c.min_samples_leaf)
                    .with_max_features(c.max_features)
                    .with_bootstrap(c.bootstrap)
                    .with_random_state(seed);
                if let Some(depth) = c.max_depth {
                    forest = forest.with_max_depth(depth);
                }
                TrainedModel::RandomForest(forest)
            }
            ModelType::DecisionTree => {
                let mut tree = DecisionTree::new()
                    .with_min_samples_split(c.min_samples_split)
                    .with_min_samples_leaf(c.min_samples_leaf)
                    .with_random_state(seed);
                if let Some(depth) = c.max_depth {
                    tree = tree.with_max_depth(depth);
                }
                TrainedModel::DecisionTree(tree)
            }
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.model.is_some()
    }

    pub fn report(&self) -> Option<&TrainingReport> {
        self.report.as_ref()
    }

    pub fn contract(&self) -> Option<&FeatureContract> {
        self.contract.as_ref()
    }

    /// Hand the fitted model and its contract over as an artifact
    pub fn into_artifact(self) -> Result<ModelArtifact> {
        match (self.contract, self.model) {
            (Some(contract), Some(model)) => ModelArtifact::new(contract, model),
            _ => Err(ForecastError::ModelNotFitted),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeseries::{FeatureConfig, FeaturePipeline, Reading};
    use chrono::{Duration, NaiveDateTime};

    fn table(n: usize) -> FeatureTable {
        let base = NaiveDateTime::parse_from_str("2009-06-01 00:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
        let readings = (0..n)
            .map(|i| {
                let hour = (i % 24) as f64;
                let x = 1.0 + (hour / 24.0 * std::f64::consts::TAU).sin() * 0.5 + (i % 5) as f64 * 0.01;
                Reading::new(base + Duration::hours(i as i64), x, x + 0.4, x - 0.3, 0.1, 240.0 + hour * 0.1)
            })
            .collect();
        FeaturePipeline::new(FeatureConfig::default())
            .unwrap()
            .run(readings)
            .unwrap()
    }

    fn small_config() -> TrainingConfig {
        TrainingConfig::default().with_n_estimators(10).with_max_depth(Some(8))
    }

    #[test]
    fn test_fit_report_and_split_sizes() {
        let table = table(418);
        let mut engine = TrainEngine::new(small_config());
        let report = engine.fit(&table).unwrap();

        assert_eq!(report.n_train + report.n_test, 250);
        assert_eq!(report.n_test, 50);
        assert_eq!(report.feature_importance.len(), 14);
        assert!(report
            .feature_importance
            .windows(2)
            .all(|w| w[0].importance >= w[1].importance));
        assert!(report.test_r2 > 0.5, "test r2 = {}", report.test_r2);
        assert_eq!(engine.contract().unwrap().len(), 14);
    }

    #[test]
    fn test_into_artifact_requires_fit() {
        let engine = TrainEngine::new(small_config());
        assert!(matches!(engine.into_artifact(), Err(ForecastError::ModelNotFitted)));

        let mut engine = TrainEngine::new(small_config().with_model_type(ModelType::DecisionTree));
        engine.fit(&table(300)).unwrap();
        let artifact = engine.into_artifact().unwrap();
        assert_eq!(artifact.model().name(), "decision_tree");
    }

    #[test]
    fn test_report_json_keys() {
        let mut engine = TrainEngine::new(small_config());
        let report = engine.fit(&table(300)).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        for key in [
            "train_rmse",
            "train_mae",
            "train_r2",
            "test_rmse",
            "test_mae",
            "test_r2",
            "n_train",
            "n_test",
            "feature_importance",
        ] {
            assert!(json.get(key).is_some(), "missing {}", key);
        }
    }

    #[test]
    fn test_too_few_rows() {
        let mut engine = TrainEngine::new(small_config());
        assert!(engine.fit(&table(169)).is_err());
    }

    #[test]
    fn test_non_finite_report_detected() {
        let mut engine = TrainEngine::new(small_config());
        let mut report = engine.fit(&table(300)).unwrap();
        assert!(report.is_finite());

        report.test_r2 = f64::NAN;
        assert!(!report.is_finite());
    }
}
