pub mod cleaning;
pub mod economic;
pub mod logic;
pub mod property;

pub use cleaning::{validate_sales, CleaningReport};
pub use economic::EconomicObservation;
pub use logic::{calculate_age, format_price};
pub use property::{PropertyFacts, SaleRecord, Subject};
