//! Gradient Boosting Machine implementation
//!
//! Histogram-based gradient-boosted regression trees in the style of
//! LightGBM: features are quantile-binned once, every tree is grown on
//! per-bin gradient histograms. Two losses are supported. Squared error fits
//! the residuals directly. Absolute error (LAD) fits the residual signs and
//! then sets each leaf to the median residual of its rows.

use crate::model::binning::FeatureBins;
use crate::model::tree::{RegressionTree, TreeParams};
use crate::model::{median, Dataset, ModelError, Regressor};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Loss {
    Squared,
    Absolute,
}

/// GBM hyperparameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GbmParams {
    /// Number of boosting iterations (trees)
    pub n_estimators: usize,
    /// Maximum depth of each tree
    pub max_depth: usize,
    /// Learning rate (shrinkage)
    pub learning_rate: f64,
    /// Minimum samples required to split a node
    pub min_samples_split: usize,
    /// Minimum samples required in a leaf node
    pub min_samples_leaf: usize,
    /// Subsample ratio of the training rows per tree
    pub subsample: f64,
    /// L2 regularisation on leaf values
    pub lambda: f64,
    /// Histogram bins per feature
    pub max_bins: usize,
    pub loss: Loss,
    pub seed: u64,
}

impl Default for GbmParams {
    fn default() -> Self {
        Self {
            n_estimators: 300,
            max_depth: 6,
            learning_rate: 0.05,
            min_samples_split: 10,
            min_samples_leaf: 5,
            subsample: 0.8,
            lambda: 1.0,
            max_bins: 64,
            loss: Loss::Squared,
            seed: 42,
        }
    }
}

impl GbmParams {
    pub fn validate(&self) -> Result<(), ModelError> {
        let bad = |msg: &str| Err(ModelError::InvalidParams(msg.to_string()));
        if self.n_estimators == 0 {
            return bad("n_estimators must be > 0");
        }
        if self.max_depth == 0 {
            return bad("max_depth must be > 0");
        }
        if !(self.learning_rate > 0.0 && self.learning_rate <= 1.0) {
            return bad("learning_rate must be in (0, 1]");
        }
        if !(self.subsample > 0.0 && self.subsample <= 1.0) {
            return bad("subsample must be in (0, 1]");
        }
        if self.min_samples_leaf == 0 {
            return bad("min_samples_leaf must be > 0");
        }
        if self.lambda < 0.0 {
            return bad("lambda must be >= 0");
        }
        if !(2..=255).contains(&self.max_bins) {
            return bad("max_bins must be in 2..=255");
        }
        Ok(())
    }
}

/// Gradient Boosting Regressor
#[derive(Debug)]
pub struct GbmRegressor {
    params: GbmParams,
    base_score: f64,
    trees: Vec<RegressionTree>,
    feature_names: Vec<String>,
    gain_importance: Vec<f64>,
}

impl GbmRegressor {
    /// Create a new GBM regressor with default parameters
    pub fn new() -> Self {
        Self::with_params(GbmParams::default())
    }

    /// Create a new GBM regressor with custom parameters
    pub fn with_params(params: GbmParams) -> Self {
        Self {
            params,
            base_score: 0.0,
            trees: Vec::new(),
            feature_names: Vec::new(),
            gain_importance: Vec::new(),
        }
    }

    pub fn is_trained(&self) -> bool {
        !self.trees.is_empty()
    }

    fn sample_rows(&self, rng: &mut StdRng, n: usize) -> Vec<usize> {
        if self.params.subsample >= 1.0 {
            return (0..n).collect();
        }
        let k = ((n as f64 * self.params.subsample).floor() as usize).clamp(1, n);
        let mut rows = rand::seq::index::sample(rng, n, k).into_vec();
        rows.sort_unstable();
        rows
    }
}

impl Default for GbmRegressor {
    fn default() -> Self {
        Self::new()
    }
}

impl Regressor for GbmRegressor {
    fn name(&self) -> &'static str {
        "gbm"
    }

    fn fit(&mut self, dataset: &Dataset) -> Result<(), ModelError> {
        self.params.validate()?;
        if dataset.is_empty() {
            return Err(ModelError::InvalidData("Empty dataset".to_string()));
        }
        let n = dataset.len();
        let n_features = dataset.num_features();
        if dataset.features.iter().any(|row| row.len() != n_features) {
            return Err(ModelError::InvalidData(
                "Row width does not match feature names".to_string(),
            ));
        }
        if dataset.targets.iter().any(|t| !t.is_finite()) {
            return Err(ModelError::InvalidData(
                "Targets must be finite".to_string(),
            ));
        }

        info!(
            "Training GBM regressor with {} samples and {} features",
            n, n_features
        );
        debug!("Parameters: {:?}", self.params);

        let bins = FeatureBins::fit(&dataset.features, n_features, self.params.max_bins);
        let binned = bins.transform(&dataset.features);
        let y = &dataset.targets;

        let tree_params = TreeParams {
            max_depth: self.params.max_depth,
            min_samples_split: self.params.min_samples_split.max(2),
            min_samples_leaf: self.params.min_samples_leaf,
            lambda: self.params.lambda,
        };

        self.base_score = match self.params.loss {
            Loss::Squared => y.iter().sum::<f64>() / n as f64,
            Loss::Absolute => median(y).unwrap_or(0.0),
        };
        self.trees.clear();
        self.gain_importance = vec![0.0; n_features];
        self.feature_names = dataset.feature_names.clone();

        let mut rng = StdRng::seed_from_u64(self.params.seed);
        let mut raw = vec![self.base_score; n];
        let mut pseudo = vec![0.0; n];

        for iteration in 0..self.params.n_estimators {
            for i in 0..n {
                let residual = y[i] - raw[i];
                pseudo[i] = match self.params.loss {
                    Loss::Squared => residual,
                    Loss::Absolute => residual.signum() * (residual != 0.0) as i32 as f64,
                };
            }

            let rows = self.sample_rows(&mut rng, n);
            let (mut tree, leaves) = RegressionTree::fit(
                &binned,
                &bins,
                rows,
                &pseudo,
                &tree_params,
                &mut self.gain_importance,
            );

            if self.params.loss == Loss::Absolute {
                for (node, leaf_rows) in &leaves {
                    let residuals: Vec<f64> = leaf_rows.iter().map(|&i| y[i] - raw[i]).collect();
                    tree.set_leaf_value(*node, median(&residuals).unwrap_or(0.0));
                }
            }

            for (i, value) in raw.iter_mut().enumerate() {
                *value += self.params.learning_rate * tree.predict_binned(&binned, i);
            }
            self.trees.push(tree);

            if (iteration + 1) % 100 == 0 {
                debug!("Boosting iteration {}", iteration + 1);
            }
        }

        if raw.iter().any(|v| !v.is_finite()) {
            self.trees.clear();
            return Err(ModelError::TrainingFailed(
                "boosting produced non-finite predictions".to_string(),
            ));
        }

        info!("Model training completed ({} trees)", self.trees.len());
        Ok(())
    }

    fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<f64>, ModelError> {
        if !self.is_trained() {
            return Err(ModelError::NotTrained);
        }
        let width = self.feature_names.len();
        features
            .iter()
            .map(|row| {
                if row.len() != width {
                    return Err(ModelError::PredictionFailed(format!(
                        "expected {width} features, got {}",
                        row.len()
                    )));
                }
                Ok(self.trees.iter().fold(self.base_score, |acc, t| {
                    acc + self.params.learning_rate * t.predict(row)
                }))
            })
            .collect()
    }

    /// Total split gain per feature, normalised to sum to 1, largest first.
    fn feature_importance(&self) -> Vec<(String, f64)> {
        let total: f64 = self.gain_importance.iter().sum();
        let mut out: Vec<(String, f64)> = self
            .feature_names
            .iter()
            .cloned()
            .zip(self.gain_importance.iter().map(|g| if total > 0.0 { g / total } else { 0.0 }))
            .collect();
        out.sort_by(|a, b| b.1.total_cmp(&a.1));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_dataset(n: usize) -> Dataset {
        let mut dataset = Dataset::new(vec![
            "feature1".to_string(),
            "feature2".to_string(),
            "noise".to_string(),
        ]);

        for i in 0..n {
            let x1 = (i % 50) as f64;
            let x2 = ((i * 7) % 13) as f64;
            let noise = ((i * 31) % 17) as f64;
            let target = x1 * 0.5 + if x2 > 6.0 { 10.0 } else { 0.0 };
            dataset.add_sample(vec![x1, x2, noise], target);
        }

        dataset
    }

    fn mse(a: &[f64], b: &[f64]) -> f64 {
        a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum::<f64>() / a.len() as f64
    }

    #[test]
    fn test_gbm_regressor_beats_the_mean() {
        let dataset = create_test_dataset(400);
        let mut model = GbmRegressor::with_params(GbmParams {
            n_estimators: 150,
            max_depth: 3,
            learning_rate: 0.1,
            min_samples_leaf: 2,
            ..GbmParams::default()
        });
        model.fit(&dataset).unwrap();

        let preds = model.predict(&dataset.features).unwrap();
        let mean = dataset.targets.iter().sum::<f64>() / dataset.len() as f64;
        let baseline = vec![mean; dataset.len()];

        assert!(mse(&dataset.targets, &preds) < 0.05 * mse(&dataset.targets, &baseline));

        let importance = model.feature_importance();
        assert_eq!(importance.len(), 3);
        assert_ne!(importance[0].0, "noise");
        let total: f64 = importance.iter().map(|(_, v)| v).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn absolute_loss_ignores_outliers() {
        let mut dataset = create_test_dataset(300);
        dataset.targets[0] = 1.0e6;
        let mut model = GbmRegressor::with_params(GbmParams {
            n_estimators: 100,
            max_depth: 3,
            learning_rate: 0.2,
            loss: Loss::Absolute,
            ..GbmParams::default()
        });
        model.fit(&dataset).unwrap();

        let preds = model.predict(&dataset.features[1..20]).unwrap();
        for (p, t) in preds.iter().zip(&dataset.targets[1..20]) {
            assert!((p - t).abs() < 5.0, "pred {p} target {t}");
        }
    }

    #[test]
    fn same_seed_same_model() {
        let dataset = create_test_dataset(200);
        let mut a = GbmRegressor::new();
        let mut b = GbmRegressor::new();
        a.fit(&dataset).unwrap();
        b.fit(&dataset).unwrap();
        assert_eq!(
            a.predict(&dataset.features).unwrap(),
            b.predict(&dataset.features).unwrap()
        );
    }

    #[test]
    fn errors_before_training_and_on_bad_input() {
        let model = GbmRegressor::new();
        assert!(matches!(
            model.predict(&[vec![1.0, 2.0, 3.0]]),
            Err(ModelError::NotTrained)
        ));

        let mut model = GbmRegressor::new();
        assert!(matches!(
            model.fit(&Dataset::new(vec!["a".into()])),
            Err(ModelError::InvalidData(_))
        ));

        let mut model = GbmRegressor::with_params(GbmParams {
            n_estimators: 5,
            ..GbmParams::default()
        });
        model.fit(&create_test_dataset(50)).unwrap();
        assert!(matches!(
            model.predict(&[vec![1.0]]),
            Err(ModelError::PredictionFailed(_))
        ));
    }

    #[test]
    fn invalid_params_are_rejected() {
        let params = GbmParams {
            learning_rate: 0.0,
            ..GbmParams::default()
        };
        assert!(params.validate().is_err());
        let params = GbmParams {
            max_bins: 300,
            ..GbmParams::default()
        };
        assert!(params.validate().is_err());
    }
}
