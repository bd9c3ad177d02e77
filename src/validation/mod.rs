//! Walk-forward validation
//!
//! - [`walk_forward`] - fold planning
//! - [`metrics`] - valuation accuracy metrics
//! - [`runner`] - trains and scores a model per fold

pub mod metrics;
pub mod runner;
pub mod walk_forward;

pub use metrics::ValuationMetrics;
pub use runner::{FoldPrediction, FoldResult, SkippedFold, ValidationReport, WalkForwardValidator};
pub use walk_forward::{plan_folds, Fold, WalkForwardConfig, WindowKind};
