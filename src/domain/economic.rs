use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One value of an economic indicator for the period starting at `period`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EconomicObservation {
    pub series: String,
    pub period: NaiveDate,
    pub value: f64,
}
