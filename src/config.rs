//! Application configuration
//!
//! Settings are read from a YAML file (`config/avm.yaml` by default), then a
//! handful of environment variables override them. A `.env` file in the
//! working directory is honoured.

use crate::errors::{AvmError, Result};
use crate::model::{GbmParams, ModelKind};
use crate::validation::WalkForwardConfig;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

pub const DEFAULT_CONFIG_PATH: &str = "config/avm.yaml";

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// SQLite database file
    pub database_path: String,
    /// Optional ZIP allow-list file (`zip_codes: {county: [zip, ...]}`)
    pub zip_codes_path: Option<String>,
    pub geography: GeoBounds,
    pub cleaning: CleaningRules,
    pub cache: CacheSettings,
    pub features: FeatureSettings,
    pub model: ModelSettings,
    pub validation: WalkForwardConfig,
    pub logging: LoggingSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: "data/avm.sqlite3".to_string(),
            zip_codes_path: None,
            geography: GeoBounds::default(),
            cleaning: CleaningRules::default(),
            cache: CacheSettings::default(),
            features: FeatureSettings::default(),
            model: ModelSettings::default(),
            validation: WalkForwardConfig::default(),
            logging: LoggingSettings::default(),
        }
    }
}

/// Metro bounding box and the point distances are measured from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeoBounds {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
    pub center_lat: f64,
    pub center_lon: f64,
}

impl Default for GeoBounds {
    /// Dallas–Fort Worth metro, centered on downtown Dallas.
    fn default() -> Self {
        Self {
            lat_min: 32.5,
            lat_max: 33.2,
            lon_min: -97.5,
            lon_max: -96.8,
            center_lat: 32.7767,
            center_lon: -96.7970,
        }
    }
}

/// A field a sale record must carry to be kept for modelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequiredField {
    Beds,
    Baths,
    Sqft,
    LotSqft,
    YearBuilt,
    Latitude,
    Longitude,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CleaningRules {
    pub required_fields: Vec<RequiredField>,
    pub min_price: i64,
    pub max_price: i64,
}

impl Default for CleaningRules {
    fn default() -> Self {
        Self {
            required_fields: vec![
                RequiredField::Sqft,
                RequiredField::Latitude,
                RequiredField::Longitude,
            ],
            min_price: 10_000,
            max_price: 20_000_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub dir: String,
    pub enabled: bool,
    pub ttl_days: i64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            dir: "data/raw".to_string(),
            enabled: true,
            ttl_days: 7,
        }
    }
}

/// An economic indicator and how long after its period it gets published.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EconomicSeriesConfig {
    pub name: String,
    #[serde(default)]
    pub publication_lag_days: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureSettings {
    /// Trailing window for ZIP-level market statistics
    pub market_lookback_months: u32,
    /// Minimum ZIP comparables before falling back to metro-wide statistics
    pub min_comps: usize,
    pub economic: Vec<EconomicSeriesConfig>,
}

impl Default for FeatureSettings {
    fn default() -> Self {
        Self {
            market_lookback_months: 12,
            min_comps: 5,
            economic: vec![
                EconomicSeriesConfig {
                    name: "mortgage_rate_30y".to_string(),
                    publication_lag_days: 1,
                },
                EconomicSeriesConfig {
                    name: "unemployment_rate".to_string(),
                    publication_lag_days: 35,
                },
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    pub kind: ModelKind,
    /// Train on ln(price) and exponentiate predictions
    pub log_target: bool,
    pub gbm: GbmParams,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            kind: ModelKind::Gbm,
            log_target: true,
            gbm: GbmParams::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    pub file: Option<String>,
    /// Size at which the log file is rotated; 0 never rotates
    pub max_file_bytes: u64,
    /// Rotated files kept as `<file>.1` .. `<file>.N`
    pub backup_count: usize,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: Some("logs/avm.log".to_string()),
            max_file_bytes: 10 * 1024 * 1024,
            backup_count: 5,
        }
    }
}

impl AppConfig {
    /// Load configuration from `path` (or the default location), then apply
    /// environment overrides.
    ///
    /// An explicitly given path must exist. When no path is given and the
    /// default file is absent, built-in defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_PATH))?
            }
            None => Self::default(),
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            AvmError::Config(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| AvmError::Config(e.to_string()))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("AVM_DATABASE_PATH") {
            self.database_path = path;
        }
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            self.logging.level = level.to_lowercase();
        }
        if let Ok(file) = std::env::var("LOG_FILE") {
            self.logging.file = if file.is_empty() { None } else { Some(file) };
        }
    }

    pub fn validate(&self) -> Result<()> {
        let g = &self.geography;
        if g.lat_min > g.lat_max || g.lon_min > g.lon_max {
            return Err(AvmError::Config(
                "geography bounds are inverted".to_string(),
            ));
        }
        if self.cleaning.min_price > self.cleaning.max_price {
            return Err(AvmError::Config(
                "cleaning.min_price exceeds cleaning.max_price".to_string(),
            ));
        }
        if self.features.market_lookback_months == 0 {
            return Err(AvmError::Config(
                "features.market_lookback_months must be > 0".to_string(),
            ));
        }
        self.validation.validate()?;
        self.model.gbm.validate().map_err(AvmError::Model)?;
        Ok(())
    }

    /// The configured ZIP allow-list, or `None` when no file is configured.
    pub fn zip_allow_list(&self) -> Result<Option<BTreeSet<String>>> {
        match &self.zip_codes_path {
            Some(path) => load_zip_allow_list(Path::new(path)).map(Some),
            None => Ok(None),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ZipCodeFile {
    zip_codes: BTreeMap<String, Vec<serde_yaml::Value>>,
}

/// Load all ZIP codes from a county-grouped YAML file, deduplicated and sorted.
///
/// ZIPs may be written as strings or bare integers; integers are zero-padded
/// to five digits.
pub fn load_zip_allow_list(path: &Path) -> Result<BTreeSet<String>> {
    let content = fs::read_to_string(path)
        .map_err(|e| AvmError::Config(format!("Failed to read {}: {e}", path.display())))?;
    parse_zip_allow_list(&content)
}

pub fn parse_zip_allow_list(content: &str) -> Result<BTreeSet<String>> {
    let file: ZipCodeFile =
        serde_yaml::from_str(content).map_err(|e| AvmError::Config(e.to_string()))?;

    let mut zips = BTreeSet::new();
    for (county, values) in file.zip_codes {
        for value in values {
            let zip = match value {
                serde_yaml::Value::String(s) => s.trim().to_string(),
                serde_yaml::Value::Number(n) => match n.as_u64() {
                    Some(z) => format!("{z:05}"),
                    None => {
                        return Err(AvmError::Config(format!(
                            "invalid ZIP {n} for county {county}"
                        )))
                    }
                },
                other => {
                    return Err(AvmError::Config(format!(
                        "invalid ZIP {other:?} for county {county}"
                    )))
                }
            };
            zips.insert(zip);
        }
    }
    Ok(zips)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::WindowKind;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.geography.lat_min, 32.5);
        assert_eq!(config.geography.lon_max, -96.8);
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let yaml = r#"
database_path: /tmp/x.sqlite3
validation:
  initial_train_months: 18
  window: rolling
  rolling_months: 24
model:
  kind: comps
"#;
        let config = AppConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.database_path, "/tmp/x.sqlite3");
        assert_eq!(config.validation.initial_train_months, 18);
        assert_eq!(config.validation.window, WindowKind::Rolling);
        assert_eq!(config.validation.rolling_months, 24);
        assert_eq!(config.validation.test_months, 1);
        assert_eq!(config.model.kind, ModelKind::Comps);
        assert!(config.model.log_target);
        assert_eq!(config.features.market_lookback_months, 12);
    }

    #[test]
    fn inverted_bounds_rejected() {
        let mut config = AppConfig::default();
        config.geography.lat_min = 40.0;
        assert!(matches!(config.validate(), Err(AvmError::Config(_))));
    }

    #[test]
    fn zip_list_is_flattened_deduped_and_sorted() {
        let yaml = r#"
zip_codes:
  dallas: ["75201", 75204, "75201"]
  tarrant: [76102, "75204"]
"#;
        let zips = parse_zip_allow_list(yaml).unwrap();
        let zips: Vec<_> = zips.into_iter().collect();
        assert_eq!(zips, vec!["75201", "75204", "76102"]);
    }

    #[test]
    fn zip_list_rejects_garbage() {
        let yaml = "zip_codes:\n  dallas: [[1, 2]]\n";
        assert!(parse_zip_allow_list(yaml).is_err());
    }
}
