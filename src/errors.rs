// errors.rs
use chrono::NaiveDate;
use thiserror::Error;

use crate::model::ModelError;
use crate::scraper::ScraperError;

/// Errors originating from either the valuation pipeline
/// (cleaning, features, validation) or downstream layers (DB, files).
#[derive(Debug, Error)]
pub enum AvmError {
    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Config Error: {0}")]
    Config(String),

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database Error: {0}")]
    DbError(String),

    #[error("Parse Error: {0}")]
    Parse(String),

    #[error("Validation Error: {0}")]
    Validation(String),

    #[error("Insufficient data: need at least {required}, got {got}")]
    InsufficientData { required: usize, got: usize },

    #[error("Leakage: feature data observed through {observed_through} used for a valuation as of {as_of}")]
    Leakage {
        observed_through: NaiveDate,
        as_of: NaiveDate,
    },

    #[error("Model Error: {0}")]
    Model(#[from] ModelError),

    #[error("Xlsx Error: {0}")]
    XlsxError(String),

    #[error("Scraper Error: {0}")]
    Scraper(#[from] ScraperError),
}

// Type alias commonly used across the pipeline.
pub type Result<T> = std::result::Result<T, AvmError>;
