// src/domain/logic.rs

use crate::config::GeoBounds;
use chrono::NaiveDate;

/// Lifecycle status of a listing, derived from its flags and raw status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanonicalStatus {
    Sold,
    Pending,
    Contingent,
    ComingSoon,
    Active,
    Other,
}

impl CanonicalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalStatus::Sold => "Sold",
            CanonicalStatus::Pending => "Pending",
            CanonicalStatus::Contingent => "Contingent",
            CanonicalStatus::ComingSoon => "Coming Soon",
            CanonicalStatus::Active => "Active",
            CanonicalStatus::Other => "Other",
        }
    }
}

/// Determines the canonical status of a listing based on a set of business rules.
/// The order of checks determines the precedence of the status lifecycle.
///
/// For example, a listing can be both 'pending' and 'contingent', but 'pending'
/// takes precedence in our lifecycle model.
pub fn derive_canonical_status(
    sold_date: &Option<NaiveDate>,
    is_pending: bool,
    is_contingent: bool,
    is_coming_soon: bool,
    raw_status: &Option<String>,
) -> CanonicalStatus {
    if sold_date.is_some() {
        return CanonicalStatus::Sold;
    }
    if is_pending {
        return CanonicalStatus::Pending;
    }
    if is_contingent {
        return CanonicalStatus::Contingent;
    }
    if is_coming_soon {
        return CanonicalStatus::ComingSoon;
    }
    match raw_status.as_deref() {
        Some("for_sale") | Some("ready_to_build") => CanonicalStatus::Active,
        _ => CanonicalStatus::Other,
    }
}

/// Property age in whole years at `reference_year`, never negative.
pub fn calculate_age(year_built: i32, reference_year: i32) -> i32 {
    (reference_year - year_built).max(0)
}

/// "$450,000"
pub fn format_price(price: f64) -> String {
    let rounded = price.round() as i64;
    let digits = rounded.unsigned_abs().to_string();

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    if rounded < 0 {
        format!("-${grouped}")
    } else {
        format!("${grouped}")
    }
}

/// Inclusive bounding-box check.
pub fn validate_coordinates(lat: f64, lon: f64, bounds: &GeoBounds) -> bool {
    (bounds.lat_min..=bounds.lat_max).contains(&lat)
        && (bounds.lon_min..=bounds.lon_max).contains(&lon)
}
