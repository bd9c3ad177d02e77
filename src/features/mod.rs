//! Feature engineering module
//!
//! - [`engineering`] - builds point-in-time feature rows
//! - [`market`] - trailing ZIP and metro price per sqft
//! - [`economic`] - economic indicators with publication lags
//! - [`spatial`] - distances

pub mod economic;
pub mod engineering;
pub mod market;
pub mod spatial;

pub use economic::EconomicIndex;
pub use engineering::{
    property_type_code, FeatureEngineer, FeatureRow, SQFT_FEATURE, ZIP_PPSF_FEATURE,
};
pub use market::{MarketHistory, MarketStats};
pub use spatial::haversine_km;
