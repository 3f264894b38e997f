//! Inference engine implementation
//!
//! Holds the model and its feature contract behind `Arc`s and answers
//! requests without locking. Large requests are split into row batches
//! predicted in parallel and stitched back together in request order.

use super::config::InferenceConfig;
use super::contract::FeatureContract;
use super::request::{PredictionRequest, RequestBody};
use crate::error::{ForecastError, Result};
use crate::training::{ModelArtifact, Regressor};
use ndarray::{concatenate, s, Array1, Array2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Inference statistics snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceStats {
    pub total_requests: u64,
    pub total_predictions: u64,
    pub error_count: u64,
    pub avg_latency_ms: f64,
}

#[derive(Debug, Default)]
struct Counters {
    requests: AtomicU64,
    predictions: AtomicU64,
    errors: AtomicU64,
    latency_us: AtomicU64,
}

/// Contract-checked inference over a shared model
pub struct InferenceEngine {
    config: InferenceConfig,
    model: Arc<dyn Regressor>,
    contract: Arc<FeatureContract>,
    counters: Counters,
}

impl std::fmt::Debug for InferenceEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceEngine")
            .field("config", &self.config)
            .field("model", &self.model.name())
            .field("features", &self.contract.len())
            .finish()
    }
}

impl InferenceEngine {
    /// Create an engine over a model and the contract it was trained with
    pub fn new(
        config: InferenceConfig,
        model: Arc<dyn Regressor>,
        contract: Arc<FeatureContract>,
    ) -> Result<Self> {
        if model.n_features() != contract.len() {
            return Err(ForecastError::Shape {
                expected: format!("{} model inputs", contract.len()),
                actual: format!("{} model inputs", model.n_features()),
            });
        }
        Ok(Self {
            config,
            model,
            contract,
            counters: Counters::default(),
        })
    }

    /// Build an engine from a loaded artifact
    pub fn from_artifact(config: InferenceConfig, artifact: ModelArtifact) -> Result<Self> {
        let (contract, model) = artifact.into_shared();
        Self::new(config, model, contract)
    }

    /// Load the artifact in `dir`
    pub fn load(config: InferenceConfig, dir: &Path) -> Result<Self> {
        Self::from_artifact(config, ModelArtifact::load(dir)?)
    }

    pub fn contract(&self) -> &FeatureContract {
        &self.contract
    }

    pub fn model_name(&self) -> &'static str {
        self.model.name()
    }

    pub fn config(&self) -> &InferenceConfig {
        &self.config
    }

    /// Predict from an HTTP body (bare array or `data` envelope)
    pub fn predict_body(&self, body: RequestBody) -> Result<Vec<f64>> {
        self.track(|| {
            let request = PredictionRequest::from_body(body, self.contract.len())?;
            self.predict_request_inner(&request)
        })
    }

    /// Predict from raw JSON bytes; malformed JSON counts as a failed request
    pub fn predict_bytes(&self, bytes: &[u8]) -> Result<Vec<f64>> {
        self.track(|| {
            let body: RequestBody =
                serde_json::from_slice(bytes).map_err(|e| ForecastError::InputFormat {
                    reason: format!("body is not valid JSON ({})", e),
                    observed: format!("{} bytes", bytes.len()),
                    expected: format!(
                        "JSON array of records or of rows with {} numbers",
                        self.contract.len()
                    ),
                })?;
            let request = PredictionRequest::from_body(body, self.contract.len())?;
            self.predict_request_inner(&request)
        })
    }

    /// Predict from a decoded request; `prediction[i]` answers `request[i]`
    pub fn predict_request(&self, request: &PredictionRequest) -> Result<Vec<f64>> {
        self.track(|| self.predict_request_inner(request))
    }

    fn predict_request_inner(&self, request: &PredictionRequest) -> Result<Vec<f64>> {
        let x = request.to_matrix(&self.contract)?;
        Ok(self.predict_matrix(&x)?.to_vec())
    }

    /// Predict a contract-ordered matrix, batching large inputs
    pub fn predict_matrix(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let n_rows = x.nrows();
        let batch_size = self.config.batch_size.max(1);

        if n_rows <= batch_size || !self.config.parallel {
            return self.model.predict(x);
        }

        let starts: Vec<usize> = (0..n_rows).step_by(batch_size).collect();
        debug!(rows = n_rows, batches = starts.len(), "Predicting in parallel batches");

        let parts = starts
            .par_iter()
            .map(|&start| {
                let end = (start + batch_size).min(n_rows);
                self.model.predict(&x.slice(s![start..end, ..]).to_owned())
            })
            .collect::<Result<Vec<Array1<f64>>>>()?;

        let views: Vec<_> = parts.iter().map(|p| p.view()).collect();
        Ok(concatenate(Axis(0), &views)?)
    }

    fn track<T>(&self, f: impl FnOnce() -> Result<Vec<T>>) -> Result<Vec<T>> {
        let start = Instant::now();
        let result = f();

        self.counters.requests.fetch_add(1, Ordering::Relaxed);
        self.counters
            .latency_us
            .fetch_add(start.elapsed().as_micros() as u64, Ordering::Relaxed);
        match &result {
            Ok(out) => {
                self.counters
                    .predictions
                    .fetch_add(out.len() as u64, Ordering::Relaxed);
            }
            Err(_) => {
                self.counters.errors.fetch_add(1, Ordering::Relaxed);
            }
        }
        result
    }

    /// Current counters
    pub fn stats(&self) -> InferenceStats {
        let requests = self.counters.requests.load(Ordering::Relaxed);
        let latency_us = self.counters.latency_us.load(Ordering::Relaxed);
        InferenceStats {
            total_requests: requests,
            total_predictions: self.counters.predictions.load(Ordering::Relaxed),
            error_count: self.counters.errors.load(Ordering::Relaxed),
            avg_latency_ms: if requests > 0 {
                latency_us as f64 / requests as f64 / 1000.0
            } else {
                0.0
            },
        }
    }
}
