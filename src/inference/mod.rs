//! Inference module
//!
//! Provides:
//! - The feature contract persisted next to each trained model
//! - Request decoding for named records and positional rows
//! - A lock-free engine with batched parallel prediction and counters

mod config;
mod engine;
pub mod contract;
pub mod request;

pub use config::InferenceConfig;
pub use contract::{FeatureContract, FEATURE_COLS_FILE};
pub use engine::{InferenceEngine, InferenceStats};
pub use request::{PredictionRequest, RequestBody};
