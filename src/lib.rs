//! energy-forecast - Household energy consumption forecasting
//!
//! Turns hourly household power readings into a leakage-free supervised
//! dataset, trains a regression forest on it and serves predictions through
//! a feature contract that keeps training and serving inputs identical.
//!
//! # Modules
//!
//! - [`timeseries`] - Calendar and windowed features, feature table, hold-out split
//! - [`training`] - Regression trees and forests, evaluation, model artifacts
//! - [`inference`] - Feature contract, request decoding, inference engine
//! - [`server`] - HTTP inference service
//! - [`cli`] - Command-line interface
//! - [`utils`] - CSV loading

pub mod error;

pub mod inference;
pub mod timeseries;
pub mod training;
pub mod utils;

pub mod cli;
pub mod server;

pub use error::{ForecastError, Result};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{ForecastError, Result};

    // Features
    pub use crate::timeseries::{
        FeatureConfig, FeaturePipeline, FeatureTable, Reading, ReadingColumns, StreamingFeatures,
        WindowConfig,
    };
    pub use crate::utils::DataLoader;

    // Training
    pub use crate::training::{
        ModelArtifact, ModelType, RandomForest, Regressor, TrainEngine, TrainingConfig, TrainingReport,
    };

    // Inference
    pub use crate::inference::{
        FeatureContract, InferenceConfig, InferenceEngine, InferenceStats, PredictionRequest,
    };
}
