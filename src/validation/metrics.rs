//! Valuation accuracy metrics.

use crate::errors::{AvmError, Result};
use crate::model::median;
use serde::{Deserialize, Serialize};

/// Accuracy of predicted prices against actual sale prices.
///
/// Percentage errors are relative to the sale price. `mdape` is in percent;
/// the `ppe*` fields are shares in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationMetrics {
    pub count: usize,
    /// Median absolute error, in dollars
    pub medae: f64,
    /// Median absolute percentage error
    pub mdape: f64,
    pub mae: f64,
    pub rmse: f64,
    /// Undefined when all actual prices are equal
    pub r2: Option<f64>,
    /// Share of predictions within 5% of the sale price
    pub ppe5: f64,
    pub ppe10: f64,
    pub ppe20: f64,
}

impl ValuationMetrics {
    pub fn compute(actual: &[f64], predicted: &[f64]) -> Result<Self> {
        if actual.len() != predicted.len() {
            return Err(AvmError::Validation(format!(
                "{} actual prices but {} predictions",
                actual.len(),
                predicted.len()
            )));
        }
        if actual.is_empty() {
            return Err(AvmError::InsufficientData {
                required: 1,
                got: 0,
            });
        }
        if actual.iter().any(|a| !(*a > 0.0)) {
            return Err(AvmError::Validation(
                "actual prices must be positive".to_string(),
            ));
        }
        if predicted.iter().any(|p| !p.is_finite()) {
            return Err(AvmError::Validation(
                "predictions must be finite".to_string(),
            ));
        }

        let n = actual.len() as f64;
        let abs: Vec<f64> = actual
            .iter()
            .zip(predicted)
            .map(|(a, p)| (p - a).abs())
            .collect();
        let pct: Vec<f64> = abs.iter().zip(actual).map(|(e, a)| e / a).collect();

        let mean = actual.iter().sum::<f64>() / n;
        let ss_res: f64 = abs.iter().map(|e| e * e).sum();
        let ss_tot: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();
        let within = |limit: f64| pct.iter().filter(|p| **p <= limit).count() as f64 / n;

        Ok(Self {
            count: actual.len(),
            medae: median(&abs).unwrap_or(0.0),
            mdape: median(&pct).unwrap_or(0.0) * 100.0,
            mae: abs.iter().sum::<f64>() / n,
            rmse: (ss_res / n).sqrt(),
            r2: (ss_tot > 0.0).then(|| 1.0 - ss_res / ss_tot),
            ppe5: within(0.05),
            ppe10: within(0.10),
            ppe20: within(0.20),
        })
    }
}

/// Population mean and standard deviation.
pub fn mean_std(values: &[f64]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    Some((mean, var.sqrt()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hand_computed_metrics() {
        let actual = [100_000.0, 200_000.0, 300_000.0, 400_000.0];
        let predicted = [104_000.0, 180_000.0, 300_000.0, 480_000.0];
        let m = ValuationMetrics::compute(&actual, &predicted).unwrap();

        // Absolute errors 4k, 20k, 0, 80k
        assert_eq!(m.count, 4);
        assert_eq!(m.medae, 12_000.0);
        assert_eq!(m.mae, 26_000.0);
        // Percentage errors 4%, 10%, 0%, 20%
        assert!((m.mdape - 7.0).abs() < 1e-9);
        assert_eq!(m.ppe5, 0.5);
        assert_eq!(m.ppe10, 0.75);
        assert_eq!(m.ppe20, 1.0);
        let expected_rmse = ((16.0e6 + 400.0e6 + 0.0 + 6400.0e6) / 4.0f64).sqrt();
        assert!((m.rmse - expected_rmse).abs() < 1e-6);
        let r2 = m.r2.unwrap();
        assert!((r2 - (1.0 - 6816.0e6 / 50_000.0e6)).abs() < 1e-9);
    }

    #[test]
    fn rejects_bad_input() {
        assert!(matches!(
            ValuationMetrics::compute(&[], &[]),
            Err(AvmError::InsufficientData { .. })
        ));
        assert!(matches!(
            ValuationMetrics::compute(&[1.0], &[1.0, 2.0]),
            Err(AvmError::Validation(_))
        ));
        assert!(ValuationMetrics::compute(&[0.0], &[1.0]).is_err());
    }

    #[test]
    fn constant_actuals_have_no_r2() {
        let m = ValuationMetrics::compute(&[100.0, 100.0], &[90.0, 110.0]).unwrap();
        assert_eq!(m.r2, None);
        assert_eq!(m.medae, 10.0);
    }

    #[test]
    fn mean_and_std() {
        assert_eq!(mean_std(&[]), None);
        assert_eq!(mean_std(&[2.0, 4.0]), Some((3.0, 1.0)));
    }
}
