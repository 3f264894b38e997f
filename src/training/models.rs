//! Regressor capability trait and the persisted model variants

use super::decision_tree::DecisionTree;
use super::random_forest::RandomForest;
use crate::error::Result;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Anything that can be fitted on a feature matrix and predict a target.
///
/// Serving only depends on this trait, so any implementation can stand in
/// for the forest.
pub trait Regressor: Send + Sync + Debug {
    /// Fit the model to training data
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Make predictions, one per row of `x`
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Normalized feature importances, if the model tracks them
    fn feature_importances(&self) -> Option<Array1<f64>> {
        None
    }

    /// Number of input columns the fitted model expects
    fn n_features(&self) -> usize;

    /// Short model name for logs and reports
    fn name(&self) -> &'static str;
}

impl Regressor for RandomForest {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        RandomForest::fit(self, x, y).map(|_| ())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        RandomForest::predict(self, x)
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        RandomForest::feature_importances(self).cloned()
    }

    fn n_features(&self) -> usize {
        RandomForest::n_features(self)
    }

    fn name(&self) -> &'static str {
        "random_forest"
    }
}

impl Regressor for DecisionTree {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        DecisionTree::fit(self, x, y).map(|_| ())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        DecisionTree::predict(self, x)
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        DecisionTree::feature_importances(self).cloned()
    }

    fn n_features(&self) -> usize {
        DecisionTree::n_features(self)
    }

    fn name(&self) -> &'static str {
        "decision_tree"
    }
}

/// Enum to hold trained model variants
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "model_type", content = "state", rename_all = "snake_case")]
pub enum TrainedModel {
    RandomForest(RandomForest),
    DecisionTree(DecisionTree),
}

impl TrainedModel {
    /// Whether the fitted state can be written as JSON and read back
    pub fn is_finite(&self) -> bool {
        match self {
            TrainedModel::RandomForest(m) => m.is_finite(),
            TrainedModel::DecisionTree(m) => m.is_finite(),
        }
    }

    fn inner(&self) -> &dyn Regressor {
        match self {
            TrainedModel::RandomForest(m) => m,
            TrainedModel::DecisionTree(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Regressor {
        match self {
            TrainedModel::RandomForest(m) => m,
            TrainedModel::DecisionTree(m) => m,
        }
    }
}

impl Regressor for TrainedModel {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.inner_mut().fit(x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.inner().predict(x)
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        self.inner().feature_importances()
    }

    fn n_features(&self) -> usize {
        self.inner().n_features()
    }

    fn name(&self) -> &'static str {
        self.inner().name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use std::sync::Arc;

    #[test]
    fn test_dispatch_through_trait_object() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = array![1.0, 1.0, 3.0, 3.0];

        let mut model = TrainedModel::DecisionTree(DecisionTree::new());
        model.fit(&x, &y).unwrap();

        let shared: Arc<dyn Regressor> = Arc::new(model);
        assert_eq!(shared.name(), "decision_tree");
        assert_eq!(shared.n_features(), 1);
        assert_eq!(shared.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_serde_tagging() {
        let model = TrainedModel::RandomForest(RandomForest::new(3));
        let json = serde_json::to_value(&model).unwrap();
        assert_eq!(json["model_type"], "random_forest");

        let back: TrainedModel = serde_json::from_value(json).unwrap();
        assert_eq!(back.name(), "random_forest");
    }
}
