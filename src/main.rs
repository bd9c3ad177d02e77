use crate::config::AppConfig;
use crate::db::{ingest_runs, init_db, sales, validation_runs, Database};
use crate::domain::{format_price, Subject};
use crate::errors::Result;
use crate::files::{load_json, save_json, write_bytes};
use crate::pipeline::PayloadFormat;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::{error, info};

mod config;
mod db;
mod domain;
mod errors;
mod features;
mod files;
mod logging;
mod model;
mod pipeline;
mod scraper;
mod spreadsheets;
mod validation;
mod valuation;

#[cfg(test)]
mod tests;

#[derive(Parser)]
#[command(name = "avm")]
#[command(about = "Automated valuation model with walk-forward validation", long_about = None)]
struct Cli {
    /// Configuration file (defaults to config/avm.yaml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Html,
}

impl From<Format> for PayloadFormat {
    fn from(f: Format) -> Self {
        match f {
            Format::Json => PayloadFormat::Json,
            Format::Html => PayloadFormat::Html,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Load listing payloads (a file or a directory) and store cleaned sales
    Ingest {
        #[arg(short, long)]
        path: PathBuf,

        #[arg(short, long, value_enum, default_value = "json")]
        format: Format,
    },

    /// Load economic observations from a JSON file
    IngestEcon {
        #[arg(short, long)]
        path: PathBuf,
    },

    /// Run walk-forward validation over the stored sales
    Validate {
        /// Write the report as a workbook
        #[arg(long)]
        xlsx: Option<PathBuf>,

        /// Write the report as JSON
        #[arg(long)]
        json: Option<PathBuf>,
    },

    /// Value properties as of a date
    Predict {
        /// JSON array of properties to value
        #[arg(short, long)]
        subjects: PathBuf,

        /// Valuation date (defaults to today)
        #[arg(long)]
        as_of: Option<NaiveDate>,

        #[arg(long)]
        xlsx: Option<PathBuf>,

        #[arg(long)]
        json: Option<PathBuf>,
    },

    /// Re-export a stored validation run
    Report {
        #[arg(long)]
        id: i64,

        #[arg(long)]
        xlsx: Option<PathBuf>,

        #[arg(long)]
        json: Option<PathBuf>,
    },

    /// Show recent ingest and validation runs
    Runs {
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
}

fn main() {
    let cli = Cli::parse();

    let config = match AppConfig::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(2);
        }
    };

    if let Err(e) = logging::init_logging(&config.logging) {
        eprintln!("Logging setup failed: {e}");
        std::process::exit(2);
    }

    if let Err(e) = run(cli.command, &config) {
        error!("{e}");
        std::process::exit(1);
    }
}

fn run(command: Commands, config: &AppConfig) -> Result<()> {
    let db = Database::new(config.database_path.clone());
    init_db(&db)?;

    match command {
        Commands::Ingest { path, format } => {
            let summary = pipeline::ingest_listings(&db, config, &path, format.into())?;
            println!(
                "{} files, {} listings, {} sales parsed, {} saved",
                summary.files, summary.listings_seen, summary.sales_parsed, summary.saved
            );
            println!("{:#?}", summary.cleaning);
        }
        Commands::IngestEcon { path } => {
            let saved = pipeline::ingest_economics(&db, &path)?;
            println!("{saved} observations saved");
        }
        Commands::Validate { xlsx, json } => {
            let (run_id, report) = pipeline::run_validation(&db, config)?;
            println!(
                "Run {run_id}: {} folds ({} skipped), {} predictions",
                report.folds.len(),
                report.skipped.len(),
                report.pooled.count
            );
            println!(
                "MedAE {} | MdAPE {:.2}% | PPE10 {:.1}% | fold MedAE {} ± {}",
                format_price(report.pooled.medae),
                report.pooled.mdape,
                report.pooled.ppe10 * 100.0,
                format_price(report.medae_mean),
                format_price(report.medae_std)
            );
            if let Some(path) = xlsx {
                write_bytes(&path, &spreadsheets::export_validation_xlsx(&report)?)?;
                info!("Wrote {}", path.display());
            }
            if let Some(path) = json {
                save_json(&path, &report)?;
                info!("Wrote {}", path.display());
            }
        }
        Commands::Predict {
            subjects,
            as_of,
            xlsx,
            json,
        } => {
            let subjects: Vec<Subject> = load_json(&subjects)?;
            let as_of = as_of.unwrap_or_else(|| Utc::now().date_naive());
            let valuations = pipeline::run_predictions(&db, config, &subjects, as_of)?;
            for v in &valuations {
                println!("{:<24} {:<40} {}", v.property_id, v.address_line, v.display_estimate());
            }
            if let Some(path) = xlsx {
                write_bytes(&path, &spreadsheets::export_valuations_xlsx(&valuations)?)?;
                info!("Wrote {}", path.display());
            }
            if let Some(path) = json {
                save_json(&path, &valuations)?;
                info!("Wrote {}", path.display());
            }
        }
        Commands::Report { id, xlsx, json } => {
            let report = validation_runs::load_validation_report(&db, id)?;
            println!(
                "Run {id}: {} model, {} folds, MedAE {} | MdAPE {:.2}%",
                report.model,
                report.folds.len(),
                format_price(report.pooled.medae),
                report.pooled.mdape
            );
            for (name, value) in report.feature_importance.iter().take(10) {
                println!("  {name:<28} {value:.3}");
            }
            if let Some(path) = xlsx {
                write_bytes(&path, &spreadsheets::export_validation_xlsx(&report)?)?;
                info!("Wrote {}", path.display());
            }
            if let Some(path) = json {
                save_json(&path, &report)?;
                info!("Wrote {}", path.display());
            }
        }
        Commands::Runs { limit } => {
            println!("{} sales stored", sales::count_sales(&db)?);
            println!("Validation runs:");
            for r in validation_runs::get_recent_validation_runs(&db, limit)? {
                println!(
                    "  #{:<4} {:<6} folds {:<3} skipped {:<3} MedAE {:<12} MdAPE {:.2}%",
                    r.id,
                    r.model,
                    r.n_folds,
                    r.n_skipped,
                    format_price(r.pooled_medae),
                    r.pooled_mdape
                );
            }
            println!("Ingest runs:");
            for r in ingest_runs::get_recent_ingest_runs(&db, limit)? {
                println!(
                    "  #{:<4} {:<10} listings {:<6} kept {:<6} {}",
                    r.id,
                    r.source,
                    r.listings_seen.unwrap_or(0),
                    r.sales_kept.unwrap_or(0),
                    r.error_message.as_deref().unwrap_or(if r.success { "ok" } else { "running" })
                );
            }
        }
    }
    Ok(())
}
