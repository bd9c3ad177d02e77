//! Economic indicators with publication lags.

use crate::config::EconomicSeriesConfig;
use crate::domain::EconomicObservation;
use chrono::{Duration, NaiveDate};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AvailableValue {
    pub value: f64,
    pub period: NaiveDate,
    /// First day the value could have been known
    pub available_on: NaiveDate,
}

/// Per-series observations ordered by the date they became available.
#[derive(Debug, Clone, Default)]
pub struct EconomicIndex {
    series: Vec<String>,
    values: HashMap<String, Vec<AvailableValue>>,
}

impl EconomicIndex {
    /// Only the configured series are kept, in configuration order.
    pub fn new(observations: &[EconomicObservation], series: &[EconomicSeriesConfig]) -> Self {
        let lags: HashMap<&str, i64> = series
            .iter()
            .map(|s| (s.name.as_str(), i64::from(s.publication_lag_days)))
            .collect();

        let mut values: HashMap<String, Vec<AvailableValue>> = HashMap::new();
        for obs in observations {
            let Some(lag) = lags.get(obs.series.as_str()) else {
                continue;
            };
            if !obs.value.is_finite() {
                continue;
            }
            values
                .entry(obs.series.clone())
                .or_default()
                .push(AvailableValue {
                    value: obs.value,
                    period: obs.period,
                    available_on: obs.period + Duration::days(*lag),
                });
        }
        for v in values.values_mut() {
            v.sort_by_key(|a| (a.available_on, a.period));
        }

        Self {
            series: series.iter().map(|s| s.name.clone()).collect(),
            values,
        }
    }

    pub fn series(&self) -> &[String] {
        &self.series
    }

    /// Latest value of `series` published on or before `as_of`.
    pub fn latest(&self, series: &str, as_of: NaiveDate) -> Option<AvailableValue> {
        let values = self.values.get(series)?;
        let n = values.partition_point(|v| v.available_on <= as_of);
        n.checked_sub(1).map(|i| values[i])
    }
}
