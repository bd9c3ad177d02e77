//! End-to-end steps behind the CLI commands.

use crate::config::AppConfig;
use crate::db::{economics, ingest_runs, sales, validation_runs, Database};
use crate::domain::{validate_sales, CleaningReport, EconomicObservation, SaleRecord, Subject};
use crate::errors::{AvmError, Result};
use crate::files::load_json;
use crate::model::PriceModel;
use crate::scraper::{scrape, HtmlPageSource, JsonFileSource, ListingSource, Query, ScrapeCache};
use crate::validation::{ValidationReport, WalkForwardValidator};
use crate::valuation::{Valuation, Valuer};
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadFormat {
    Json,
    Html,
}

impl PayloadFormat {
    pub fn source(&self) -> Box<dyn ListingSource> {
        match self {
            PayloadFormat::Json => Box::new(JsonFileSource),
            PayloadFormat::Html => Box::new(HtmlPageSource),
        }
    }

    fn extension(&self) -> &'static str {
        match self {
            PayloadFormat::Json => "json",
            PayloadFormat::Html => "html",
        }
    }
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct IngestSummary {
    pub files: usize,
    pub listings_seen: usize,
    pub sales_parsed: usize,
    pub rejected: usize,
    pub cleaning: CleaningReport,
    pub saved: usize,
}

/// Payload files under `path`: the file itself, or every file in the
/// directory with the format's extension, in name order.
fn payload_files(path: &Path, format: PayloadFormat) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        return Err(AvmError::NotFound(path.display().to_string()));
    }
    let mut files: Vec<PathBuf> = fs::read_dir(path)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file() && p.extension().and_then(|e| e.to_str()) == Some(format.extension())
        })
        .collect();
    files.sort();
    Ok(files)
}

/// The query for one payload file. The modification time is part of the
/// query so an edited file gets a new cache key.
fn file_query(path: &Path) -> Query {
    let mut query = Query::new();
    query.insert("path".to_string(), path.display().to_string());
    if let Some(mtime) = fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
    {
        query.insert("mtime".to_string(), mtime.as_secs().to_string());
    }
    query
}

/// Parse, clean and store the sales found in payload files.
pub fn ingest_listings(
    db: &Database,
    config: &AppConfig,
    path: &Path,
    format: PayloadFormat,
) -> Result<IngestSummary> {
    let source = format.source();
    let run_id = ingest_runs::start_ingest_run(db, source.name(), Utc::now().timestamp())?;

    let result = ingest_files(db, config, source.as_ref(), path, format);

    let (seen, kept, error) = match &result {
        Ok(summary) => (summary.listings_seen, summary.saved, None),
        Err(e) => (0, 0, Some(e.to_string())),
    };
    ingest_runs::end_ingest_run(db, run_id, Utc::now().timestamp(), seen, kept, error)?;
    result
}

fn ingest_files(
    db: &Database,
    config: &AppConfig,
    source: &dyn ListingSource,
    path: &Path,
    format: PayloadFormat,
) -> Result<IngestSummary> {
    let cache = ScrapeCache::new(&config.cache.dir, config.cache.enabled, config.cache.ttl_days)?;
    let zip_allow_list = config.zip_allow_list()?;
    let mut summary = IngestSummary::default();
    let mut records = Vec::new();

    for file in payload_files(path, format)? {
        let listings = scrape(source, &file_query(&file), &cache, config.cache.enabled)?;
        summary.files += 1;
        summary.listings_seen += listings.len();

        for listing in &listings {
            match SaleRecord::from_listing(listing) {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(e) => {
                    warn!("Skipping listing in {}: {}", file.display(), e);
                    summary.rejected += 1;
                }
            }
        }
    }

    summary.sales_parsed = records.len();
    let (clean, report) = validate_sales(
        records,
        &config.cleaning,
        &config.geography,
        zip_allow_list.as_ref(),
    );
    summary.cleaning = report;
    summary.saved = sales::save_sales(db, &clean)?;

    info!(
        "Ingested {} files: {} listings, {} sales parsed, {} saved",
        summary.files, summary.listings_seen, summary.sales_parsed, summary.saved
    );
    Ok(summary)
}

pub fn ingest_economics(db: &Database, path: &Path) -> Result<usize> {
    let observations: Vec<EconomicObservation> = load_json(path)?;
    let saved = economics::save_observations(db, &observations)?;
    info!("Saved {} economic observations from {}", saved, path.display());
    Ok(saved)
}

/// Walk-forward validation over every stored sale; the report is saved as a
/// new run.
pub fn run_validation(db: &Database, config: &AppConfig) -> Result<(i64, ValidationReport)> {
    let all_sales = sales::load_sales(db, None, None)?;
    let observations = economics::load_observations(db)?;
    info!(
        "Loaded {} sales and {} economic observations",
        all_sales.len(),
        observations.len()
    );

    let validator = WalkForwardValidator::new(
        config.validation.clone(),
        config.features.clone(),
        config.geography.clone(),
    );
    let report = validator.run(&all_sales, &observations, || {
        PriceModel::from_settings(&config.model)
    })?;

    let run_id = validation_runs::save_validation_run(db, &report, Utc::now().timestamp())?;
    info!("Saved validation run {}", run_id);
    Ok((run_id, report))
}

/// Value `subjects` as of `as_of` with a model trained on earlier sales.
pub fn run_predictions(
    db: &Database,
    config: &AppConfig,
    subjects: &[Subject],
    as_of: NaiveDate,
) -> Result<Vec<Valuation>> {
    let history = sales::load_sales(db, None, Some(as_of))?;
    let observations = economics::load_observations(db)?;
    let valuer = Valuer::train(&history, &observations, as_of, config)?;
    valuer.value(subjects)
}
