//! Validation and cleaning of sale records before they reach feature
//! engineering. Every dropped record is counted against exactly one reason.

use crate::config::{CleaningRules, GeoBounds, RequiredField};
use crate::domain::logic::validate_coordinates;
use crate::domain::property::{PropertyFacts, SaleRecord};
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use tracing::{info, warn};

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct CleaningReport {
    pub input: usize,
    pub missing_fields: usize,
    pub price_out_of_range: usize,
    pub duplicates: usize,
    pub out_of_bounds: usize,
    pub zip_not_allowed: usize,
    pub kept: usize,
}

fn has_field(facts: &PropertyFacts, field: RequiredField) -> bool {
    match field {
        RequiredField::Beds => facts.beds.is_some(),
        RequiredField::Baths => facts.baths.is_some(),
        RequiredField::Sqft => facts.sqft.is_some(),
        RequiredField::LotSqft => facts.lot_sqft.is_some(),
        RequiredField::YearBuilt => facts.year_built.is_some(),
        RequiredField::Latitude => facts.latitude.is_some(),
        RequiredField::Longitude => facts.longitude.is_some(),
    }
}

/// Drop incomplete, implausible, duplicate and out-of-area sales.
///
/// Duplicates are the same normalized address sold on the same date; the
/// first occurrence is kept. Records without coordinates skip the bounding
/// box check (they are only dropped if coordinates are required).
pub fn validate_sales(
    records: Vec<SaleRecord>,
    rules: &CleaningRules,
    bounds: &GeoBounds,
    zip_allow_list: Option<&BTreeSet<String>>,
) -> (Vec<SaleRecord>, CleaningReport) {
    let mut report = CleaningReport {
        input: records.len(),
        ..CleaningReport::default()
    };
    let mut seen = HashSet::new();
    let mut kept = Vec::with_capacity(records.len());

    for record in records {
        if !rules
            .required_fields
            .iter()
            .all(|f| has_field(&record.facts, *f))
        {
            report.missing_fields += 1;
            continue;
        }

        if record.sale_price <= 0
            || record.sale_price < rules.min_price
            || record.sale_price > rules.max_price
        {
            report.price_out_of_range += 1;
            continue;
        }

        if !seen.insert((record.facts.address_key(), record.sale_date)) {
            report.duplicates += 1;
            continue;
        }

        if let (Some(lat), Some(lon)) = (record.facts.latitude, record.facts.longitude) {
            if !validate_coordinates(lat, lon, bounds) {
                report.out_of_bounds += 1;
                continue;
            }
        }

        if let Some(allowed) = zip_allow_list {
            if !allowed.contains(&record.facts.postal_code) {
                report.zip_not_allowed += 1;
                continue;
            }
        }

        kept.push(record);
    }

    report.kept = kept.len();

    if report.duplicates > 0 {
        warn!("Removed {} duplicate sales", report.duplicates);
    }
    if report.out_of_bounds > 0 {
        info!(
            "Filtered {} properties outside geographic bounds",
            report.out_of_bounds
        );
    }
    info!(
        input = report.input,
        kept = report.kept,
        missing_fields = report.missing_fields,
        price_out_of_range = report.price_out_of_range,
        zip_not_allowed = report.zip_not_allowed,
        "Validated sales"
    );

    (kept, report)
}
