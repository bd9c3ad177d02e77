pub mod connection;
pub mod economics;
pub mod ingest_runs;
pub mod properties;
pub mod sales;
pub mod validation_runs;

pub use connection::{init_db, Database};
