//! Valuing properties as of a date with a model trained on prior sales.

use crate::config::AppConfig;
use crate::domain::{format_price, EconomicObservation, SaleRecord, Subject};
use crate::errors::{AvmError, Result};
use crate::features::FeatureEngineer;
use crate::model::PriceModel;
use crate::validation::WindowKind;
use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Valuation {
    pub property_id: String,
    pub address_line: String,
    pub postal_code: String,
    pub as_of: NaiveDate,
    /// Rounded to the nearest dollar
    pub estimate: i64,
    pub list_price: Option<i64>,
    pub observed_through: Option<NaiveDate>,
}

impl Valuation {
    pub fn display_estimate(&self) -> String {
        format_price(self.estimate as f64)
    }
}

/// A model fitted on every sale before `as_of`.
pub struct Valuer {
    as_of: NaiveDate,
    engineer: FeatureEngineer,
    model: PriceModel,
}

impl Valuer {
    pub fn train(
        sales: &[SaleRecord],
        economics: &[EconomicObservation],
        as_of: NaiveDate,
        config: &AppConfig,
    ) -> Result<Self> {
        let history: Vec<SaleRecord> = sales
            .iter()
            .filter(|s| s.sale_date < as_of)
            .cloned()
            .collect();

        let train_start = match config.validation.window {
            WindowKind::Expanding => NaiveDate::MIN,
            WindowKind::Rolling => as_of
                .checked_sub_months(Months::new(config.validation.rolling_months))
                .unwrap_or(NaiveDate::MIN),
        };
        let train: Vec<&SaleRecord> = history
            .iter()
            .filter(|s| s.sale_date >= train_start)
            .collect();

        let required = config.validation.min_train_samples.max(1);
        if train.len() < required {
            return Err(AvmError::InsufficientData {
                required,
                got: train.len(),
            });
        }

        let engineer = FeatureEngineer::new(&config.features, &config.geography, &history, economics);
        let dataset = engineer.training_set(train.iter().copied())?;
        let mut model = PriceModel::from_settings(&config.model);
        model.fit(&dataset)?;

        info!(
            "Trained {} valuer as of {} on {} sales",
            model.name(),
            as_of,
            train.len()
        );

        Ok(Self {
            as_of,
            engineer,
            model,
        })
    }

    pub fn value(&self, subjects: &[Subject]) -> Result<Vec<Valuation>> {
        if subjects.is_empty() {
            return Ok(Vec::new());
        }
        let rows = self
            .engineer
            .prediction_rows(subjects.iter().map(|s| &s.facts), self.as_of)?;
        let values: Vec<Vec<f64>> = rows.iter().map(|r| r.values.clone()).collect();
        let estimates = self.model.predict(&values)?;

        Ok(subjects
            .iter()
            .zip(rows)
            .zip(estimates)
            .map(|((subject, row), estimate)| Valuation {
                property_id: subject.facts.id.clone(),
                address_line: subject.facts.address_line.clone(),
                postal_code: subject.facts.postal_code.clone(),
                as_of: self.as_of,
                estimate: estimate.round() as i64,
                list_price: subject.list_price,
                observed_through: row.observed_through,
            })
            .collect())
    }
}
