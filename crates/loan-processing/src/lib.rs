//! Loan Application Cleaning Library
//!
//! A batch cleaning pipeline for the loan-application dataset, built with
//! Rust and Polars.
//!
//! # Overview
//!
//! Two tables are cleaned independently:
//!
//! - **Application data** (one row per applicant): columns that are mostly
//!   empty are dropped, the external scores are filled with their median,
//!   occupation and education are filled with the most common value among
//!   similar applicants, rows with extreme income/credit/annuity/children
//!   values are removed, and birth and employment-start dates are derived
//!   from their day offsets.
//! - **Previous applications** (one row per historical loan): every
//!   remaining gap is filled with its column median or mode, and the
//!   `DAYS_*` offsets are turned into `*_ACTUAL` calendar dates.
//!
//! Day offsets count days relative to a fixed reference date. Offsets
//! outside the validity window, including the `365243` "not applicable"
//! placeholder, become missing dates instead of taking part in arithmetic.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use loan_processing::{CleaningPipeline, load_csv};
//! use std::path::Path;
//!
//! let application = load_csv(Path::new("application_data.csv"))?;
//! let previous = load_csv(Path::new("previous_application.csv"))?;
//!
//! let pipeline = CleaningPipeline::builder().build()?;
//! let application = pipeline.clean_application(application)?;
//! let previous = pipeline.clean_previous_application(previous)?;
//!
//! println!("Dropped: {:?}", application.summary.dropped_columns);
//! ```
//!
//! # Configuration
//!
//! Use [`CleaningConfig`] to customize thresholds and column lists:
//!
//! ```rust,ignore
//! use loan_processing::config::*;
//!
//! let config = CleaningConfig::builder()
//!     .missing_column_threshold(0.5)      // Drop columns with >50% missing
//!     .iqr_multiplier(3.0)                // Wider outlier fence
//!     .outlier_columns(["AMT_INCOME_TOTAL", "AMT_CREDIT"])
//!     .build()?;
//! ```

pub mod cleaner;
pub mod config;
pub mod error;
pub mod imputers;
pub mod loader;
pub mod pipeline;
pub mod reporting;
pub mod types;
pub mod utils;

// Re-exports for convenient access
pub use cleaner::{DateReconstructor, MissingValueReducer};
pub use config::{
    CleaningConfig, CleaningConfigBuilder, ConfigValidationError, DateColumn, GroupFill,
};
pub use error::{CleaningError, ResultExt};
pub use imputers::{GroupedModeImputer, StatisticalImputer};
pub use loader::{load_column_descriptions, load_csv};
pub use pipeline::{
    CleaningPipeline, CleaningPipelineBuilder, CleaningStage, ClosureProgressReporter, IqrBounds,
    OutlierHandler, ProgressReporter, ProgressUpdate,
};
pub use reporting::{CleaningReport, ReportGenerator, TableReport};
pub use types::{
    ActionType, CleaningAction, CleaningResult, CleaningSummary, DateReconstruction,
    DroppedColumn, ImputationMethod, ImputationRecord, OutlierRemoval, TableKind,
};
