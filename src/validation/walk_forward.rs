//! Walk-forward fold planning
//!
//! A fold trains on sales before its cutoff and is scored on the sales that
//! close in the test window after it. Cutoffs advance by `step_months` from
//! an origin, so every fold only ever sees its own past.

use crate::domain::SaleRecord;
use crate::errors::{AvmError, Result};
use chrono::{Datelike, Duration, Months, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowKind {
    /// Train on everything since the origin
    Expanding,
    /// Train on the last `rolling_months` before the cutoff
    Rolling,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkForwardConfig {
    /// Origin of the first training window; defaults to the first sale's month
    pub start: Option<NaiveDate>,
    pub initial_train_months: u32,
    pub test_months: u32,
    pub step_months: u32,
    pub window: WindowKind,
    /// Training window length for `window: rolling`
    pub rolling_months: u32,
    /// Gap between the cutoff and the first test sale
    pub embargo_days: u32,
    pub min_train_samples: usize,
    pub min_test_samples: usize,
    /// Keep only the most recent folds
    pub max_folds: Option<usize>,
}

impl Default for WalkForwardConfig {
    fn default() -> Self {
        Self {
            start: None,
            initial_train_months: 24,
            test_months: 1,
            step_months: 1,
            window: WindowKind::Expanding,
            rolling_months: 36,
            embargo_days: 0,
            min_train_samples: 200,
            min_test_samples: 10,
            max_folds: None,
        }
    }
}

impl WalkForwardConfig {
    pub fn validate(&self) -> Result<()> {
        let zero = |field: &str| Err(AvmError::Config(format!("validation.{field} must be > 0")));
        if self.initial_train_months == 0 {
            return zero("initial_train_months");
        }
        if self.test_months == 0 {
            return zero("test_months");
        }
        if self.step_months == 0 {
            return zero("step_months");
        }
        if self.window == WindowKind::Rolling && self.rolling_months == 0 {
            return zero("rolling_months");
        }
        if self.max_folds == Some(0) {
            return zero("max_folds");
        }
        // The shortest possible test window is 28 days per month
        if i64::from(self.embargo_days) >= 28 * i64::from(self.test_months) {
            return Err(AvmError::Config(
                "validation.embargo_days leaves no test window".to_string(),
            ));
        }
        Ok(())
    }
}

/// One train/test split in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fold {
    pub index: usize,
    pub train_start: NaiveDate,
    /// Valuation time: the model knows nothing dated on or after it
    pub cutoff: NaiveDate,
    pub test_start: NaiveDate,
    pub test_end: NaiveDate,
}

impl Fold {
    pub fn in_train(&self, date: NaiveDate) -> bool {
        self.train_start <= date && date < self.cutoff
    }

    pub fn in_test(&self, date: NaiveDate) -> bool {
        self.test_start <= date && date < self.test_end
    }

    /// Split `sales` into (train, test); sales in neither window are dropped.
    pub fn partition<'a>(&self, sales: &'a [SaleRecord]) -> (Vec<&'a SaleRecord>, Vec<&'a SaleRecord>) {
        let train = sales.iter().filter(|s| self.in_train(s.sale_date)).collect();
        let test = sales.iter().filter(|s| self.in_test(s.sale_date)).collect();
        (train, test)
    }

    /// Enforces `max(train) < cutoff <= min(test)`.
    pub fn check_partition(&self, train: &[&SaleRecord], test: &[&SaleRecord]) -> Result<()> {
        if let Some(latest) = train.iter().map(|s| s.sale_date).max() {
            if latest >= self.cutoff {
                return Err(AvmError::Leakage {
                    observed_through: latest,
                    as_of: self.cutoff,
                });
            }
        }
        if let Some(earliest) = test.iter().map(|s| s.sale_date).min() {
            if earliest < self.cutoff {
                return Err(AvmError::Validation(format!(
                    "fold {}: test sale on {earliest} precedes cutoff {}",
                    self.index, self.cutoff
                )));
            }
        }
        Ok(())
    }
}

fn add_months(date: NaiveDate, months: u32) -> Result<NaiveDate> {
    date.checked_add_months(Months::new(months))
        .ok_or_else(|| AvmError::Validation(format!("date overflow adding {months} months to {date}")))
}

fn months_between(from: NaiveDate, to: NaiveDate) -> usize {
    let months = (to.year() - from.year()) * 12 + to.month() as i32 - from.month() as i32;
    months.max(0) as usize
}

/// Plan the folds covering sales from `first_sale` to `last_sale`.
pub fn plan_folds(
    first_sale: NaiveDate,
    last_sale: NaiveDate,
    config: &WalkForwardConfig,
) -> Result<Vec<Fold>> {
    config.validate()?;
    if first_sale > last_sale {
        return Err(AvmError::Validation(format!(
            "first sale {first_sale} is after last sale {last_sale}"
        )));
    }

    let origin = match config.start {
        Some(start) => start,
        None => first_sale.with_day(1).unwrap_or(first_sale),
    };

    let first_cutoff = add_months(origin, config.initial_train_months)?;
    if first_cutoff > last_sale {
        return Err(AvmError::InsufficientData {
            required: config.initial_train_months as usize,
            got: months_between(origin, last_sale),
        });
    }

    let mut folds = Vec::new();
    for k in 0u32.. {
        let cutoff = add_months(first_cutoff, k * config.step_months)?;
        let test_start = cutoff + Duration::days(i64::from(config.embargo_days));
        if test_start > last_sale {
            break;
        }
        let train_start = match config.window {
            WindowKind::Expanding => origin,
            WindowKind::Rolling => cutoff
                .checked_sub_months(Months::new(config.rolling_months))
                .map_or(origin, |d| d.max(origin)),
        };
        folds.push(Fold {
            index: folds.len(),
            train_start,
            cutoff,
            test_start,
            test_end: add_months(cutoff, config.test_months)?,
        });
    }

    if folds.is_empty() {
        return Err(AvmError::InsufficientData {
            required: 1,
            got: 0,
        });
    }

    if let Some(max) = config.max_folds {
        if folds.len() > max {
            folds.drain(..folds.len() - max);
            for (i, fold) in folds.iter_mut().enumerate() {
                fold.index = i;
            }
        }
    }

    Ok(folds)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn config() -> WalkForwardConfig {
        WalkForwardConfig {
            initial_train_months: 6,
            ..WalkForwardConfig::default()
        }
    }

    #[test]
    fn expanding_folds_step_monthly() {
        let folds = plan_folds(d("2022-01-15"), d("2022-09-20"), &config()).unwrap();
        assert_eq!(folds.len(), 3);
        assert_eq!(folds[0].train_start, d("2022-01-01"));
        assert_eq!(folds[0].cutoff, d("2022-07-01"));
        assert_eq!(folds[0].test_start, d("2022-07-01"));
        assert_eq!(folds[0].test_end, d("2022-08-01"));
        assert_eq!(folds[2].cutoff, d("2022-09-01"));
        assert!(folds.iter().all(|f| f.train_start == d("2022-01-01")));
        for pair in folds.windows(2) {
            assert!(pair[0].cutoff < pair[1].cutoff);
        }
    }

    #[test]
    fn rolling_window_and_embargo() {
        let cfg = WalkForwardConfig {
            window: WindowKind::Rolling,
            rolling_months: 3,
            embargo_days: 7,
            test_months: 2,
            ..config()
        };
        let folds = plan_folds(d("2022-01-03"), d("2022-12-31"), &cfg).unwrap();
        let f = &folds[1];
        assert_eq!(f.cutoff, d("2022-08-01"));
        assert_eq!(f.train_start, d("2022-05-01"));
        assert_eq!(f.test_start, d("2022-08-08"));
        assert_eq!(f.test_end, d("2022-10-01"));
        assert!(!f.in_test(d("2022-08-07")));
        assert!(f.in_test(d("2022-08-08")));
        assert!(!f.in_train(d("2022-08-01")));
        assert!(f.in_train(d("2022-07-31")));
    }

    #[test]
    fn max_folds_keeps_most_recent() {
        let cfg = WalkForwardConfig {
            max_folds: Some(2),
            ..config()
        };
        let folds = plan_folds(d("2022-01-15"), d("2022-12-20"), &cfg).unwrap();
        assert_eq!(folds.len(), 2);
        assert_eq!(folds[0].index, 0);
        assert_eq!(folds[1].cutoff, d("2022-12-01"));
    }

    #[test]
    fn too_little_history_is_an_error() {
        let err = plan_folds(d("2022-01-15"), d("2022-04-20"), &config()).unwrap_err();
        assert!(matches!(
            err,
            AvmError::InsufficientData {
                required: 6,
                got: 3
            }
        ));
    }

    #[test]
    fn zero_lengths_rejected() {
        let cfg = WalkForwardConfig {
            step_months: 0,
            ..config()
        };
        assert!(matches!(cfg.validate(), Err(AvmError::Config(_))));
        let cfg = WalkForwardConfig {
            embargo_days: 31,
            ..config()
        };
        assert!(cfg.validate().is_err());
    }
}
