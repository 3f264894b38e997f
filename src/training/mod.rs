//! Model training module
//!
//! Provides:
//! - The `Regressor` capability trait and persisted model variants
//! - Regression decision trees and random forests
//! - Chronological hold-out evaluation (RMSE, MAE, R²)
//! - Model artifact persistence alongside the feature contract

mod config;
mod engine;
mod metrics;
mod models;
pub mod artifact;
pub mod decision_tree;
pub mod random_forest;

pub use artifact::{ModelArtifact, MODEL_FILE};
pub use config::{ModelType, TrainingConfig};
pub use decision_tree::{DecisionTree, TreeNode};
pub use engine::{FeatureImportance, TrainEngine, TrainingReport, METRICS_FILE};
pub use metrics::RegressionMetrics;
pub use models::{Regressor, TrainedModel};
pub use random_forest::{MaxFeatures, RandomForest};
