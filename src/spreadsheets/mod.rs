pub mod export_xlsx;

pub use export_xlsx::{export_validation_xlsx, export_valuations_xlsx};
