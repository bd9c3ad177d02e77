//! Price models
//!
//! This module provides:
//! - A histogram gradient-boosting regressor
//! - A comparable-sales baseline
//! - `PriceModel`, which applies the optional log-price target transform

pub mod baseline;
pub mod binning;
pub mod dataset;
pub mod gbm;
pub mod tree;

pub use baseline::CompsBaseline;
pub use dataset::Dataset;
pub use gbm::{GbmParams, GbmRegressor, Loss};

use crate::config::ModelSettings;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur with the model
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Training failed: {0}")]
    TrainingFailed(String),

    #[error("Prediction failed: {0}")]
    PredictionFailed(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("Model not trained")]
    NotTrained,
}

/// A model mapping feature rows to a numeric target.
pub trait Regressor {
    fn name(&self) -> &'static str;

    fn fit(&mut self, dataset: &Dataset) -> Result<(), ModelError>;

    fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<f64>, ModelError>;

    /// Normalised importance per feature, largest first.
    fn feature_importance(&self) -> Vec<(String, f64)> {
        Vec::new()
    }

    /// Whether the model should be trained on ln(price) when log targets are
    /// enabled.
    fn uses_log_target(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Gbm,
    Comps,
}

/// A regressor trained on sale prices, optionally through ln(price).
pub struct PriceModel {
    inner: Box<dyn Regressor>,
    log_target: bool,
}

impl PriceModel {
    pub fn new(inner: Box<dyn Regressor>, log_target: bool) -> Self {
        let log_target = log_target && inner.uses_log_target();
        Self { inner, log_target }
    }

    /// A fresh, untrained model as configured.
    pub fn from_settings(settings: &ModelSettings) -> Self {
        let inner: Box<dyn Regressor> = match settings.kind {
            ModelKind::Gbm => Box::new(GbmRegressor::with_params(settings.gbm.clone())),
            ModelKind::Comps => Box::new(CompsBaseline::new()),
        };
        Self::new(inner, settings.log_target)
    }

    pub fn name(&self) -> &'static str {
        self.inner.name()
    }

    pub fn log_target(&self) -> bool {
        self.log_target
    }

    /// Fit on a dataset whose targets are sale prices in dollars.
    pub fn fit(&mut self, dataset: &Dataset) -> Result<(), ModelError> {
        if !self.log_target {
            return self.inner.fit(dataset);
        }
        if dataset.targets.iter().any(|p| *p <= 0.0) {
            return Err(ModelError::InvalidData(
                "log target requires positive prices".to_string(),
            ));
        }
        self.inner.fit(&dataset.map_targets(f64::ln))
    }

    /// Predicted prices in dollars.
    pub fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<f64>, ModelError> {
        let raw = self.inner.predict(features)?;
        Ok(if self.log_target {
            raw.into_iter().map(f64::exp).collect()
        } else {
            raw
        })
    }

    pub fn feature_importance(&self) -> Vec<(String, f64)> {
        self.inner.feature_importance()
    }
}

/// Median of the values; the mean of the two middle values for an even count.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    Some(if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    })
}
