//! Comparable-sales baseline: sqft times the trailing ZIP price per sqft.

use crate::features::{SQFT_FEATURE, ZIP_PPSF_FEATURE};
use crate::model::{median, Dataset, ModelError, Regressor};
use tracing::info;

#[derive(Debug, Default)]
pub struct CompsBaseline {
    sqft_idx: Option<usize>,
    ppsf_idx: Option<usize>,
    /// Used when a row lacks sqft or a market price per sqft
    fallback: Option<f64>,
}

impl CompsBaseline {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Regressor for CompsBaseline {
    fn name(&self) -> &'static str {
        "comps"
    }

    fn fit(&mut self, dataset: &Dataset) -> Result<(), ModelError> {
        if dataset.is_empty() {
            return Err(ModelError::InvalidData("Empty dataset".to_string()));
        }
        let sqft_idx = dataset.feature_index(SQFT_FEATURE).ok_or_else(|| {
            ModelError::InvalidData(format!("missing feature {SQFT_FEATURE}"))
        })?;
        let ppsf_idx = dataset.feature_index(ZIP_PPSF_FEATURE).ok_or_else(|| {
            ModelError::InvalidData(format!("missing feature {ZIP_PPSF_FEATURE}"))
        })?;

        self.sqft_idx = Some(sqft_idx);
        self.ppsf_idx = Some(ppsf_idx);
        self.fallback = median(&dataset.targets);
        info!(
            "Comps baseline fitted on {} sales (fallback {:.0})",
            dataset.len(),
            self.fallback.unwrap_or(f64::NAN)
        );
        Ok(())
    }

    fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<f64>, ModelError> {
        let (sqft_idx, ppsf_idx, fallback) = match (self.sqft_idx, self.ppsf_idx, self.fallback) {
            (Some(s), Some(p), Some(f)) => (s, p, f),
            _ => return Err(ModelError::NotTrained),
        };
        features
            .iter()
            .map(|row| {
                let sqft = row.get(sqft_idx).copied().ok_or_else(|| {
                    ModelError::PredictionFailed("row shorter than sqft index".to_string())
                })?;
                let ppsf = row.get(ppsf_idx).copied().unwrap_or(f64::NAN);
                let estimate = sqft * ppsf;
                Ok(if estimate.is_finite() && estimate > 0.0 {
                    estimate
                } else {
                    fallback
                })
            })
            .collect()
    }

    fn uses_log_target(&self) -> bool {
        false
    }
}
