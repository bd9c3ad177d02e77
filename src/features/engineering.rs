//! Feature engineering for valuation models
//!
//! Every row is built as of a valuation date. Market and economic inputs are
//! restricted to what was known before that date, and the row records the
//! latest timestamp it consulted so callers can prove it.

use crate::config::{FeatureSettings, GeoBounds};
use crate::domain::{calculate_age, EconomicObservation, PropertyFacts, SaleRecord};
use crate::errors::{AvmError, Result};
use crate::features::economic::EconomicIndex;
use crate::features::market::MarketHistory;
use crate::features::spatial::haversine_km;
use crate::model::Dataset;
use chrono::{Datelike, NaiveDate};
use std::f64::consts::PI;

pub const SQFT_FEATURE: &str = "sqft";
pub const ZIP_PPSF_FEATURE: &str = "zip_median_ppsf";

/// Property types with a stable numeric code; anything else is missing.
const PROPERTY_TYPES: &[&str] = &[
    "single_family",
    "condo",
    "townhome",
    "multi_family",
    "mobile",
    "land",
    "farm",
];

/// One feature vector and the time bounds of the data behind it.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub values: Vec<f64>,
    pub as_of: NaiveDate,
    /// Latest timestamp of any dated input, `None` if only static facts were used
    pub observed_through: Option<NaiveDate>,
}

impl FeatureRow {
    /// Fails if any input is dated after `as_of`.
    pub fn check(&self, as_of: NaiveDate) -> Result<()> {
        match self.observed_through {
            Some(observed_through) if observed_through > as_of => Err(AvmError::Leakage {
                observed_through,
                as_of,
            }),
            _ => Ok(()),
        }
    }
}

/// Map a raw property type onto its code.
pub fn property_type_code(raw: Option<&str>) -> f64 {
    let Some(raw) = raw else {
        return f64::NAN;
    };
    let normalized = raw.trim().to_lowercase().replace([' ', '-'], "_");
    let canonical = match normalized.as_str() {
        "single_family" | "single_family_residential" | "house" => "single_family",
        "condo" | "condos" | "condominium" | "condo_townhome_rowhome_coop" => "condo",
        "townhome" | "townhomes" | "townhouse" => "townhome",
        "multi_family" | "duplex_triplex" | "apartment" => "multi_family",
        "mobile" | "manufactured" => "mobile",
        "land" | "lot" => "land",
        "farm" | "ranch" => "farm",
        _ => return f64::NAN,
    };
    PROPERTY_TYPES
        .iter()
        .position(|t| *t == canonical)
        .map_or(f64::NAN, |i| i as f64)
}

fn opt(v: Option<f64>) -> f64 {
    v.unwrap_or(f64::NAN)
}

fn later(a: Option<NaiveDate>, b: Option<NaiveDate>) -> Option<NaiveDate> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

/// Feature engineer over a fixed body of prior sales and economic data.
pub struct FeatureEngineer {
    settings: FeatureSettings,
    center: (f64, f64),
    market: MarketHistory,
    economics: EconomicIndex,
}

impl FeatureEngineer {
    /// `history` is the pool of sales market statistics may draw on.
    pub fn new(
        settings: &FeatureSettings,
        geography: &GeoBounds,
        history: &[SaleRecord],
        economics: &[EconomicObservation],
    ) -> Self {
        Self {
            settings: settings.clone(),
            center: (geography.center_lat, geography.center_lon),
            market: MarketHistory::new(history),
            economics: EconomicIndex::new(economics, &settings.economic),
        }
    }

    /// Get feature names
    pub fn feature_names(&self) -> Vec<String> {
        let mut names: Vec<String> = [
            "beds",
            "baths",
            SQFT_FEATURE,
            "lot_sqft",
            "age",
            "property_type",
            "latitude",
            "longitude",
            "distance_to_center_km",
            "months_since_2000",
            "month_sin",
            "month_cos",
            ZIP_PPSF_FEATURE,
            "zip_comps",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        names.extend(self.economics.series().iter().map(|s| format!("econ_{s}")));
        names
    }

    /// Build the feature row for `facts` valued at `as_of`.
    pub fn build_row(&self, facts: &PropertyFacts, as_of: NaiveDate) -> FeatureRow {
        let mut values = Vec::with_capacity(14 + self.economics.series().len());
        let mut observed_through = None;

        // Property
        values.push(opt(facts.beds));
        values.push(opt(facts.baths));
        values.push(opt(facts.sqft));
        values.push(opt(facts.lot_sqft));
        values.push(
            facts
                .year_built
                .map_or(f64::NAN, |y| calculate_age(y, as_of.year()) as f64),
        );
        values.push(property_type_code(facts.property_type.as_deref()));

        // Spatial
        values.push(opt(facts.latitude));
        values.push(opt(facts.longitude));
        values.push(match (facts.latitude, facts.longitude) {
            (Some(lat), Some(lon)) => haversine_km(lat, lon, self.center.0, self.center.1),
            _ => f64::NAN,
        });

        // Temporal
        let month0 = as_of.month0() as f64;
        values.push(f64::from(as_of.year() - 2000) * 12.0 + month0);
        values.push((2.0 * PI * month0 / 12.0).sin());
        values.push((2.0 * PI * month0 / 12.0).cos());

        // Market
        let stats = self.market.stats(
            facts.postal_code.trim(),
            as_of,
            self.settings.market_lookback_months,
            self.settings.min_comps,
        );
        values.push(stats.median_ppsf);
        values.push(stats.zip_comps as f64);
        observed_through = later(observed_through, stats.observed_through);

        // Economic
        for series in self.economics.series() {
            match self.economics.latest(series, as_of) {
                Some(v) => {
                    values.push(v.value);
                    observed_through = later(observed_through, Some(v.available_on));
                }
                None => values.push(f64::NAN),
            }
        }

        FeatureRow {
            values,
            as_of,
            observed_through,
        }
    }

    /// Training rows, each valued at its own sale date, with sale prices as
    /// targets.
    pub fn training_set<'a>(
        &self,
        sales: impl IntoIterator<Item = &'a SaleRecord>,
    ) -> Result<Dataset> {
        let mut dataset = Dataset::new(self.feature_names());
        for sale in sales {
            let row = self.build_row(&sale.facts, sale.sale_date);
            row.check(sale.sale_date)?;
            dataset.add_sample(row.values, sale.sale_price as f64);
        }
        Ok(dataset)
    }

    /// Rows for properties valued at `as_of`.
    pub fn prediction_rows<'a>(
        &self,
        facts: impl IntoIterator<Item = &'a PropertyFacts>,
        as_of: NaiveDate,
    ) -> Result<Vec<FeatureRow>> {
        facts
            .into_iter()
            .map(|f| {
                let row = self.build_row(f, as_of);
                row.check(as_of)?;
                Ok(row)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EconomicSeriesConfig;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn facts(zip: &str) -> PropertyFacts {
        PropertyFacts {
            id: "t:1".to_string(),
            address_line: "1 Elm St".to_string(),
            city: "Dallas".to_string(),
            postal_code: zip.to_string(),
            latitude: Some(32.8),
            longitude: Some(-96.8),
            beds: Some(3.0),
            baths: Some(2.0),
            sqft: Some(1500.0),
            lot_sqft: None,
            year_built: Some(2000),
            property_type: Some("single_family".to_string()),
        }
    }

    fn sale(date: &str, price: i64) -> SaleRecord {
        SaleRecord {
            facts: facts("75201"),
            sale_price: price,
            sale_date: d(date),
            list_price: None,
            list_date: None,
        }
    }

    fn settings() -> FeatureSettings {
        FeatureSettings {
            market_lookback_months: 12,
            min_comps: 1,
            economic: vec![EconomicSeriesConfig {
                name: "mortgage_rate_30y".to_string(),
                publication_lag_days: 7,
            }],
        }
    }

    #[test]
    fn row_layout_matches_names() {
        let engineer = FeatureEngineer::new(&settings(), &GeoBounds::default(), &[], &[]);
        let names = engineer.feature_names();
        let row = engineer.build_row(&facts("75201"), d("2023-07-15"));
        assert_eq!(row.values.len(), names.len());
        assert_eq!(names.last().unwrap(), "econ_mortgage_rate_30y");

        let idx = |n: &str| names.iter().position(|x| x == n).unwrap();
        assert_eq!(row.values[idx("age")], 23.0);
        assert_eq!(row.values[idx(SQFT_FEATURE)], 1500.0);
        assert_eq!(row.values[idx("property_type")], 0.0);
        assert_eq!(row.values[idx("months_since_2000")], 23.0 * 12.0 + 6.0);
        assert!(row.values[idx("lot_sqft")].is_nan());
        assert!(row.values[idx(ZIP_PPSF_FEATURE)].is_nan());
        assert!(row.values[idx("econ_mortgage_rate_30y")].is_nan());
        assert_eq!(row.observed_through, None);
    }

    #[test]
    fn rows_never_look_past_their_date() {
        let history = vec![
            sale("2023-01-10", 300_000),
            sale("2023-03-10", 450_000),
            sale("2023-06-10", 600_000),
        ];
        let econ = vec![
            EconomicObservation {
                series: "mortgage_rate_30y".to_string(),
                period: d("2023-02-27"),
                value: 6.5,
            },
            EconomicObservation {
                series: "mortgage_rate_30y".to_string(),
                period: d("2023-03-06"),
                value: 7.0,
            },
        ];
        let engineer = FeatureEngineer::new(&settings(), &GeoBounds::default(), &history, &econ);
        let names = engineer.feature_names();
        let ppsf = names.iter().position(|n| n == ZIP_PPSF_FEATURE).unwrap();

        let as_of = d("2023-03-10");
        let rows = engineer.prediction_rows([&facts("75201")], as_of).unwrap();
        let row = &rows[0];
        // The sale on the valuation date itself is excluded
        assert_eq!(row.values[ppsf], 200.0);
        assert_eq!(*row.values.last().unwrap(), 6.5);
        assert_eq!(row.observed_through, Some(d("2023-03-06")));
        assert!(row.check(as_of).is_ok());

        let training = engineer.training_set(&history).unwrap();
        assert_eq!(training.len(), 3);
        assert_eq!(training.targets[2], 600_000.0);
        assert!(training.features[0][ppsf].is_nan());
    }

    #[test]
    fn check_flags_future_data() {
        let row = FeatureRow {
            values: vec![],
            as_of: d("2023-01-01"),
            observed_through: Some(d("2023-01-02")),
        };
        assert!(matches!(
            row.check(d("2023-01-01")),
            Err(AvmError::Leakage { .. })
        ));
    }

    #[test]
    fn property_type_codes_are_stable() {
        assert_eq!(property_type_code(Some("Single Family")), 0.0);
        assert_eq!(property_type_code(Some("townhomes")), 2.0);
        assert!(property_type_code(Some("castle")).is_nan());
        assert!(property_type_code(None).is_nan());
    }
}
