//! Pipeline module.
//!
//! This module provides the table cleaning pipeline and related components.

mod builder;
pub mod outliers;
pub mod progress;

pub use builder::{CleaningPipeline, CleaningPipelineBuilder};
pub use outliers::{IqrBounds, OutlierHandler};
pub use progress::{
    CleaningStage, ClosureProgressReporter, ProgressReporter, ProgressUpdate,
};
