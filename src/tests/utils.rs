use crate::config::AppConfig;
use crate::db::connection::{init_db, Database};
use crate::domain::{PropertyFacts, SaleRecord};
use chrono::{Datelike, Duration, NaiveDate};
use tempfile::TempDir;

/// A fresh database with the production schema, in its own directory.
/// Keep the `TempDir` alive for as long as the database is used.
pub fn init_test_db() -> (TempDir, Database) {
    let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir failed: {e}"));
    let path = dir.path().join("test_db.sqlite3");
    let db = Database::new(path.display().to_string());

    init_db(&db).unwrap_or_else(|e| panic!("Database initialization failed: {e}"));

    (dir, db)
}

/// Config pointing every path into `dir`, sized for quick tests.
pub fn test_config(dir: &TempDir) -> AppConfig {
    let mut config = AppConfig::default();
    config.database_path = dir.path().join("test_db.sqlite3").display().to_string();
    config.cache.dir = dir.path().join("cache").display().to_string();
    config.logging.file = None;
    config.features.min_comps = 3;
    config.validation.initial_train_months = 12;
    config.validation.min_train_samples = 100;
    config.validation.min_test_samples = 10;
    config.validation.max_folds = Some(4);
    config.model.gbm.n_estimators = 80;
    config.model.gbm.max_depth = 4;
    config.model.gbm.learning_rate = 0.1;
    config
}

pub fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap_or_else(|e| panic!("bad date {s}: {e}"))
}

const ZIPS: [(&str, f64, f64, f64); 4] = [
    ("75201", 300.0, 32.79, -96.80),
    ("75204", 250.0, 32.80, -96.78),
    ("75214", 200.0, 32.82, -96.75),
    ("76102", 150.0, 32.75, -97.33),
];

pub fn facts(i: usize) -> PropertyFacts {
    let (zip, _, lat, lon) = ZIPS[i % ZIPS.len()];
    PropertyFacts {
        id: format!("test:{i}"),
        address_line: format!("{} Elm St", 100 + i),
        city: "Dallas".to_string(),
        postal_code: zip.to_string(),
        latitude: Some(lat + (i % 7) as f64 * 0.001),
        longitude: Some(lon - (i % 5) as f64 * 0.001),
        beds: Some((2 + i % 3) as f64),
        baths: Some((1 + i % 2) as f64),
        sqft: Some(1000.0 + ((i * 37) % 2000) as f64),
        lot_sqft: Some(5000.0 + ((i * 53) % 3000) as f64),
        year_built: Some(1960 + (i % 60) as i32),
        property_type: Some("single_family".to_string()),
    }
}

/// One sale a day from `start`: ZIP price per sqft times sqft, a steady
/// upward trend, and a little deterministic noise.
pub fn synthetic_sales(start: NaiveDate, n: usize) -> Vec<SaleRecord> {
    (0..n)
        .map(|i| {
            let facts = facts(i);
            let sale_date = start + Duration::days(i as i64);
            let months = (sale_date.year() - start.year()) * 12 + sale_date.month() as i32
                - start.month() as i32;
            let ppsf = ZIPS[i % ZIPS.len()].1;
            let noise = ((i * 7919) % 21) as f64 / 1000.0 - 0.01;
            let price = ppsf
                * facts.sqft.unwrap_or(1500.0)
                * (1.0 + 0.004 * months as f64)
                * (1.0 + noise);
            SaleRecord {
                facts,
                sale_price: price.round() as i64,
                sale_date,
                list_price: None,
                list_date: None,
            }
        })
        .collect()
}
