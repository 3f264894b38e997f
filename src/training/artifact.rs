//! Model artifact directory
//!
//! A trained model is stored as `model.json` (the serialized regressor) next
//! to `feature_cols.json` (its feature contract). Both are required to serve.

use super::models::{Regressor, TrainedModel};
use crate::error::{ForecastError, Result};
use crate::inference::FeatureContract;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// File name of the serialized model inside a model directory
pub const MODEL_FILE: &str = "model.json";

/// A fitted model together with the contract it was trained against
#[derive(Debug, Clone)]
pub struct ModelArtifact {
    contract: FeatureContract,
    model: TrainedModel,
}

impl ModelArtifact {
    /// Pair a model with its contract; their widths must agree
    pub fn new(contract: FeatureContract, model: TrainedModel) -> Result<Self> {
        if model.n_features() != contract.len() {
            return Err(ForecastError::Shape {
                expected: format!("{} model inputs", contract.len()),
                actual: format!("{} model inputs", model.n_features()),
            });
        }
        Ok(Self { contract, model })
    }

    pub fn contract(&self) -> &FeatureContract {
        &self.contract
    }

    pub fn model(&self) -> &TrainedModel {
        &self.model
    }

    /// Split into shared, read-only handles for serving
    pub fn into_shared(self) -> (Arc<FeatureContract>, Arc<dyn Regressor>) {
        let model: Arc<dyn Regressor> = Arc::new(self.model);
        (Arc::new(self.contract), model)
    }

    /// Write `model.json` and `feature_cols.json` into `dir`
    pub fn save(&self, dir: &Path) -> Result<()> {
        if !self.model.is_finite() {
            return Err(ForecastError::Serialization(format!(
                "{} holds non-finite values and would not load back",
                self.model.name()
            )));
        }
        std::fs::create_dir_all(dir)?;

        let file = File::create(dir.join(MODEL_FILE))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, &self.model)?;
        writer.flush()?;

        self.contract.save(dir)?;

        info!(
            dir = %dir.display(),
            model = self.model.name(),
            features = self.contract.len(),
            "Model artifact saved"
        );
        Ok(())
    }

    /// Load an artifact; any missing or unreadable part is a load error
    pub fn load(dir: &Path) -> Result<Self> {
        let contract = FeatureContract::load(dir)?;

        let path = dir.join(MODEL_FILE);
        let file = File::open(&path)
            .map_err(|e| ForecastError::ModelLoad(format!("{}: {}", path.display(), e)))?;
        let model: TrainedModel = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| ForecastError::ModelLoad(format!("{}: {}", path.display(), e)))?;

        let artifact = Self::new(contract, model)
            .map_err(|e| ForecastError::ModelLoad(format!("{}: {}", dir.display(), e)))?;

        info!(
            dir = %dir.display(),
            model = artifact.model.name(),
            features = artifact.contract.len(),
            "Model artifact loaded"
        );
        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::DecisionTree;
    use ndarray::array;

    fn fitted() -> ModelArtifact {
        let contract = FeatureContract::from_schema(&["a".to_string(), "b".to_string()], &[]).unwrap();
        let mut model = TrainedModel::DecisionTree(DecisionTree::new());
        model
            .fit(&array![[0.0, 1.0], [1.0, 0.0], [2.0, 1.0]], &array![1.0, 2.0, 3.0])
            .unwrap();
        ModelArtifact::new(contract, model).unwrap()
    }

    #[test]
    fn test_save_load_predicts_identically() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("model");
        let artifact = fitted();
        artifact.save(&dir).unwrap();

        let loaded = ModelArtifact::load(&dir).unwrap();
        assert_eq!(loaded.contract(), artifact.contract());

        let x = array![[0.5, 0.5], [1.5, 0.0]];
        assert_eq!(
            loaded.model().predict(&x).unwrap(),
            artifact.model().predict(&x).unwrap()
        );
    }

    #[test]
    fn test_missing_model_file() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("model");
        fitted().save(&dir).unwrap();
        std::fs::remove_file(dir.join(MODEL_FILE)).unwrap();
        assert!(matches!(ModelArtifact::load(&dir), Err(ForecastError::ModelLoad(_))));
    }

    #[test]
    fn test_corrupt_model_file() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("model");
        fitted().save(&dir).unwrap();
        std::fs::write(dir.join(MODEL_FILE), b"\x00garbage").unwrap();
        assert!(matches!(ModelArtifact::load(&dir), Err(ForecastError::ModelLoad(_))));
    }

    #[test]
    fn test_width_mismatch() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("model");
        fitted().save(&dir).unwrap();
        std::fs::write(dir.join("feature_cols.json"), r#"["a", "b", "c"]"#).unwrap();
        assert!(matches!(ModelArtifact::load(&dir), Err(ForecastError::ModelLoad(_))));
    }

    #[test]
    fn test_non_finite_model_not_saved() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("model");
        let contract = FeatureContract::from_schema(&["a".to_string()], &[]).unwrap();
        let mut model = TrainedModel::DecisionTree(DecisionTree::new());
        model.fit(&array![[0.0], [0.0]], &array![f64::MAX, f64::MAX]).unwrap();

        let err = ModelArtifact::new(contract, model).unwrap().save(&dir).unwrap_err();
        assert!(matches!(err, ForecastError::Serialization(_)));
        assert!(!dir.join(MODEL_FILE).exists());
    }
}
