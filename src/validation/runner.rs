//! Walk-forward validation runner
//!
//! For each planned fold: partition sales by time, build features from data
//! before the cutoff, fit a fresh model and score its valuations as of the
//! cutoff against the prices the test sales actually closed at.

use crate::config::{FeatureSettings, GeoBounds};
use crate::domain::{EconomicObservation, SaleRecord};
use crate::errors::{AvmError, Result};
use crate::features::FeatureEngineer;
use crate::model::PriceModel;
use crate::validation::metrics::{mean_std, ValuationMetrics};
use crate::validation::walk_forward::{plan_folds, Fold, WalkForwardConfig};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoldResult {
    pub fold: Fold,
    pub n_train: usize,
    pub n_test: usize,
    pub metrics: ValuationMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedFold {
    pub fold: Fold,
    pub n_train: usize,
    pub n_test: usize,
    pub reason: String,
}

/// One out-of-sample valuation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoldPrediction {
    pub fold: usize,
    pub property_id: String,
    pub sale_date: NaiveDate,
    /// The valuation date the prediction was made as of
    pub as_of: NaiveDate,
    pub actual: f64,
    pub predicted: f64,
    pub observed_through: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub model: String,
    pub log_target: bool,
    pub config: WalkForwardConfig,
    pub folds: Vec<FoldResult>,
    pub skipped: Vec<SkippedFold>,
    /// Metrics over every out-of-sample prediction
    pub pooled: ValuationMetrics,
    pub medae_mean: f64,
    pub medae_std: f64,
    pub predictions: Vec<FoldPrediction>,
    /// Mean per-fold importance, largest first
    pub feature_importance: Vec<(String, f64)>,
}

pub struct WalkForwardValidator {
    config: WalkForwardConfig,
    features: FeatureSettings,
    geography: GeoBounds,
}

impl WalkForwardValidator {
    pub fn new(config: WalkForwardConfig, features: FeatureSettings, geography: GeoBounds) -> Self {
        Self {
            config,
            features,
            geography,
        }
    }

    /// Run every fold with a fresh model from `model_factory`.
    pub fn run<F>(
        &self,
        sales: &[SaleRecord],
        economics: &[EconomicObservation],
        model_factory: F,
    ) -> Result<ValidationReport>
    where
        F: Fn() -> PriceModel,
    {
        let mut sales = sales.to_vec();
        sales.sort_by(|a, b| a.sale_date.cmp(&b.sale_date));
        let (first, last) = match (sales.first(), sales.last()) {
            (Some(f), Some(l)) => (f.sale_date, l.sale_date),
            _ => {
                return Err(AvmError::InsufficientData {
                    required: self.config.min_train_samples.max(1),
                    got: 0,
                })
            }
        };

        let folds = plan_folds(first, last, &self.config)?;
        info!(
            "Walk-forward validation over {} sales ({} to {}), {} folds",
            sales.len(),
            first,
            last,
            folds.len()
        );

        let mut results = Vec::new();
        let mut skipped = Vec::new();
        let mut predictions = Vec::new();
        let mut importance: BTreeMap<String, f64> = BTreeMap::new();
        let mut model_name = String::new();
        let mut log_target = false;

        for fold in folds {
            let (train, test) = fold.partition(&sales);
            let (n_train, n_test) = (train.len(), test.len());

            let reason = if n_train < self.config.min_train_samples {
                Some(format!(
                    "{n_train} training sales, need {}",
                    self.config.min_train_samples
                ))
            } else if n_test < self.config.min_test_samples.max(1) {
                Some(format!(
                    "{n_test} test sales, need {}",
                    self.config.min_test_samples.max(1)
                ))
            } else {
                None
            };
            if let Some(reason) = reason {
                warn!("Skipping fold {} (cutoff {}): {}", fold.index, fold.cutoff, reason);
                skipped.push(SkippedFold {
                    fold,
                    n_train,
                    n_test,
                    reason,
                });
                continue;
            }

            fold.check_partition(&train, &test)?;

            // Market statistics may use any sale before the cutoff
            let cutoff_idx = sales.partition_point(|s| s.sale_date < fold.cutoff);
            let engineer = FeatureEngineer::new(
                &self.features,
                &self.geography,
                &sales[..cutoff_idx],
                economics,
            );

            let dataset = engineer.training_set(train.iter().copied())?;

            let mut model = model_factory();
            model.fit(&dataset)?;
            model_name = model.name().to_string();
            log_target = model.log_target();

            let rows = engineer.prediction_rows(test.iter().map(|s| &s.facts), fold.cutoff)?;
            let values: Vec<Vec<f64>> = rows.iter().map(|r| r.values.clone()).collect();
            let predicted = model.predict(&values)?;
            let actual: Vec<f64> = test.iter().map(|s| s.sale_price as f64).collect();
            let metrics = ValuationMetrics::compute(&actual, &predicted)?;

            info!(
                "Fold {} cutoff {}: train {} test {} MedAE {:.0} MdAPE {:.2}%",
                fold.index, fold.cutoff, n_train, n_test, metrics.medae, metrics.mdape
            );

            for ((sale, row), p) in test.iter().zip(&rows).zip(&predicted) {
                predictions.push(FoldPrediction {
                    fold: fold.index,
                    property_id: sale.facts.id.clone(),
                    sale_date: sale.sale_date,
                    as_of: fold.cutoff,
                    actual: sale.sale_price as f64,
                    predicted: *p,
                    observed_through: row.observed_through,
                });
            }
            for (name, value) in model.feature_importance() {
                *importance.entry(name).or_insert(0.0) += value;
            }

            results.push(FoldResult {
                fold,
                n_train,
                n_test,
                metrics,
            });
        }

        if results.is_empty() {
            return Err(AvmError::InsufficientData {
                required: 1,
                got: 0,
            });
        }

        let actual: Vec<f64> = predictions.iter().map(|p| p.actual).collect();
        let predicted: Vec<f64> = predictions.iter().map(|p| p.predicted).collect();
        let pooled = ValuationMetrics::compute(&actual, &predicted)?;
        let medaes: Vec<f64> = results.iter().map(|r| r.metrics.medae).collect();
        let (medae_mean, medae_std) = mean_std(&medaes).unwrap_or((0.0, 0.0));

        let n_folds = results.len() as f64;
        let mut feature_importance: Vec<(String, f64)> = importance
            .into_iter()
            .map(|(name, total)| (name, total / n_folds))
            .collect();
        feature_importance.sort_by(|a, b| b.1.total_cmp(&a.1));

        info!(
            "Validation complete: {} folds scored, {} skipped, pooled MedAE {:.0}, PPE10 {:.1}%",
            results.len(),
            skipped.len(),
            pooled.medae,
            pooled.ppe10 * 100.0
        );

        Ok(ValidationReport {
            model: model_name,
            log_target,
            config: self.config.clone(),
            folds: results,
            skipped,
            pooled,
            medae_mean,
            medae_std,
            predictions,
            feature_importance,
        })
    }
}
