//! Point-in-time market statistics from prior sales.

use crate::domain::SaleRecord;
use crate::model::median;
use chrono::{Months, NaiveDate};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketStats {
    /// Median price per sqft, NaN when no sale qualifies
    pub median_ppsf: f64,
    /// Comparable sales in the ZIP within the window
    pub zip_comps: usize,
    /// The metro-wide median was used
    pub fallback: bool,
    /// Latest sale date consulted
    pub observed_through: Option<NaiveDate>,
}

/// Sales with a usable price per sqft, by date, overall and per ZIP.
#[derive(Debug, Clone, Default)]
pub struct MarketHistory {
    all: Vec<(NaiveDate, f64)>,
    by_zip: HashMap<String, Vec<(NaiveDate, f64)>>,
}

impl MarketHistory {
    pub fn new(sales: &[SaleRecord]) -> Self {
        let mut all = Vec::new();
        let mut by_zip: HashMap<String, Vec<(NaiveDate, f64)>> = HashMap::new();
        for sale in sales {
            if let Some(ppsf) = sale.price_per_sqft() {
                all.push((sale.sale_date, ppsf));
                by_zip
                    .entry(sale.facts.postal_code.clone())
                    .or_default()
                    .push((sale.sale_date, ppsf));
            }
        }
        all.sort_by(|a, b| a.0.cmp(&b.0));
        for v in by_zip.values_mut() {
            v.sort_by(|a, b| a.0.cmp(&b.0));
        }
        Self { all, by_zip }
    }

    /// Statistics over sales in `[as_of - lookback_months, as_of)`.
    pub fn stats(
        &self,
        zip: &str,
        as_of: NaiveDate,
        lookback_months: u32,
        min_comps: usize,
    ) -> MarketStats {
        let from = as_of
            .checked_sub_months(Months::new(lookback_months))
            .unwrap_or(NaiveDate::MIN);

        let zip_window = self
            .by_zip
            .get(zip)
            .map(|v| window(v, from, as_of))
            .unwrap_or_default();

        let (sample, fallback) = if zip_window.len() >= min_comps.max(1) {
            (zip_window, false)
        } else {
            (window(&self.all, from, as_of), true)
        };

        let ppsf: Vec<f64> = sample.iter().map(|(_, p)| *p).collect();
        MarketStats {
            median_ppsf: median(&ppsf).unwrap_or(f64::NAN),
            zip_comps: zip_window.len(),
            fallback,
            observed_through: sample.last().map(|(d, _)| *d),
        }
    }
}

fn window(sorted: &[(NaiveDate, f64)], from: NaiveDate, to: NaiveDate) -> &[(NaiveDate, f64)] {
    let start = sorted.partition_point(|(d, _)| *d < from);
    let end = sorted.partition_point(|(d, _)| *d < to);
    &sorted[start..end.max(start)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PropertyFacts;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn sale(zip: &str, date: &str, price: i64, sqft: f64) -> SaleRecord {
        SaleRecord {
            facts: PropertyFacts {
                id: format!("t:{zip}{date}{price}"),
                address_line: "1 Main St".to_string(),
                city: "Dallas".to_string(),
                postal_code: zip.to_string(),
                latitude: None,
                longitude: None,
                beds: None,
                baths: None,
                sqft: Some(sqft),
                lot_sqft: None,
                year_built: None,
                property_type: None,
            },
            sale_price: price,
            sale_date: d(date),
            list_price: None,
            list_date: None,
        }
    }

    #[test]
    fn only_strictly_earlier_sales_count() {
        let history = MarketHistory::new(&[
            sale("75201", "2023-01-10", 200_000, 1000.0),
            sale("75201", "2023-02-10", 300_000, 1000.0),
            sale("75201", "2023-03-01", 900_000, 1000.0),
        ]);
        let stats = history.stats("75201", d("2023-03-01"), 12, 1);
        assert_eq!(stats.zip_comps, 2);
        assert_eq!(stats.median_ppsf, 250.0);
        assert!(!stats.fallback);
        assert_eq!(stats.observed_through, Some(d("2023-02-10")));
    }

    #[test]
    fn falls_back_to_metro_when_zip_is_thin() {
        let history = MarketHistory::new(&[
            sale("75201", "2023-01-10", 200_000, 1000.0),
            sale("76102", "2023-01-11", 100_000, 1000.0),
            sale("76102", "2023-01-12", 150_000, 1000.0),
        ]);
        let stats = history.stats("75201", d("2023-06-01"), 12, 2);
        assert!(stats.fallback);
        assert_eq!(stats.zip_comps, 1);
        assert_eq!(stats.median_ppsf, 150.0);
    }

    #[test]
    fn lookback_window_excludes_old_sales() {
        let history = MarketHistory::new(&[
            sale("75201", "2021-01-10", 200_000, 1000.0),
            sale("75201", "2023-01-10", 400_000, 1000.0),
        ]);
        let stats = history.stats("75201", d("2023-06-01"), 12, 1);
        assert_eq!(stats.zip_comps, 1);
        assert_eq!(stats.median_ppsf, 400.0);

        let empty = history.stats("75201", d("2020-01-01"), 12, 1);
        assert!(empty.median_ppsf.is_nan());
        assert_eq!(empty.observed_through, None);
    }
}
