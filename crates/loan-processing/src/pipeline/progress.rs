//! Progress reporting for the cleaning pipeline.
//!
//! Both table pipelines may run on separate threads, so every update carries
//! the table it belongs to and reporters must be `Send + Sync`.
//!
//! # Example
//!
//! ```rust,ignore
//! use loan_processing::CleaningPipeline;
//!
//! let pipeline = CleaningPipeline::builder()
//!     .on_progress(|update| {
//!         println!("[{}] {:?}: {}", update.table, update.stage, update.message);
//!     })
//!     .build()?;
//! ```

use crate::types::TableKind;
use serde::{Deserialize, Serialize};

/// Stages of a table cleaning run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleaningStage {
    /// Capturing the input shape
    Initializing,
    /// Dropping mostly-empty columns
    ReducingMissing,
    /// Filling missing values
    Imputation,
    /// Removing rows outside the IQR fence
    OutlierFiltering,
    /// Deriving calendar dates from day offsets
    DateReconstruction,
    /// Table cleaned successfully
    Complete,
    /// Cleaning failed with an error
    Failed,
}

impl CleaningStage {
    /// Returns a human-readable name for the stage.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Initializing => "Initializing",
            Self::ReducingMissing => "Reducing Missing Columns",
            Self::Imputation => "Imputing Values",
            Self::OutlierFiltering => "Filtering Outliers",
            Self::DateReconstruction => "Reconstructing Dates",
            Self::Complete => "Complete",
            Self::Failed => "Failed",
        }
    }

    /// Share of the overall run taken by this stage.
    ///
    /// The working stages sum to 1.0.
    pub fn weight(&self) -> f32 {
        match self {
            Self::Initializing => 0.05,
            Self::ReducingMissing => 0.15,
            Self::Imputation => 0.30,
            Self::OutlierFiltering => 0.25,
            Self::DateReconstruction => 0.25,
            Self::Complete | Self::Failed => 0.0,
        }
    }

    /// Cumulative progress at the start of this stage.
    pub fn base_progress(&self) -> f32 {
        match self {
            Self::Initializing => 0.0,
            Self::ReducingMissing => 0.05,
            Self::Imputation => 0.20,
            Self::OutlierFiltering => 0.50,
            Self::DateReconstruction => 0.75,
            Self::Complete => 1.0,
            Self::Failed => 0.0,
        }
    }
}

/// Progress update emitted by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// Table being cleaned
    pub table: TableKind,

    pub stage: CleaningStage,

    /// Column currently being processed, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,

    /// Overall progress (0.0 - 1.0)
    pub progress: f32,

    /// Progress within current stage (0.0 - 1.0)
    pub stage_progress: f32,

    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub items_processed: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub items_total: Option<usize>,
}

impl ProgressUpdate {
    /// Creates a new progress update for a stage.
    pub fn new(
        table: TableKind,
        stage: CleaningStage,
        stage_progress: f32,
        message: impl Into<String>,
    ) -> Self {
        let progress = stage.base_progress() + (stage.weight() * stage_progress);
        Self {
            table,
            stage,
            column: None,
            progress: progress.clamp(0.0, 1.0),
            stage_progress: stage_progress.clamp(0.0, 1.0),
            message: message.into(),
            items_processed: None,
            items_total: None,
        }
    }

    /// Creates a per-column update; `current` columns of `total` are done.
    pub fn with_column(
        table: TableKind,
        stage: CleaningStage,
        column: impl Into<String>,
        current: usize,
        total: usize,
        message: impl Into<String>,
    ) -> Self {
        let stage_progress = if total > 0 {
            current as f32 / total as f32
        } else {
            0.0
        };
        Self {
            column: Some(column.into()),
            items_processed: Some(current),
            items_total: Some(total),
            ..Self::new(table, stage, stage_progress, message)
        }
    }

    pub fn complete(table: TableKind, message: impl Into<String>) -> Self {
        Self::new(table, CleaningStage::Complete, 1.0, message)
    }

    pub fn failed(table: TableKind, message: impl Into<String>) -> Self {
        Self {
            progress: 0.0,
            ..Self::new(table, CleaningStage::Failed, 0.0, message)
        }
    }
}

/// Receives progress updates while a table is cleaned.
///
/// Implementations must be `Send + Sync`: the two table pipelines share one
/// reporter across threads.
pub trait ProgressReporter: Send + Sync {
    /// Called at every stage boundary and once per processed column.
    fn report(&self, update: ProgressUpdate);
}

/// Wrapper that implements [`ProgressReporter`] using a closure.
pub struct ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    callback: F,
}

impl<F> ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressReporter for ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    fn report(&self, update: ProgressUpdate) {
        (self.callback)(update);
    }
}

static_assertions::assert_impl_all!(ProgressUpdate: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_progress_update_new() {
        let update = ProgressUpdate::new(
            TableKind::Application,
            CleaningStage::OutlierFiltering,
            0.5,
            "Filtering...",
        );
        assert_eq!(update.stage, CleaningStage::OutlierFiltering);
        assert!(update.column.is_none());
        assert_eq!(update.stage_progress, 0.5);
        assert!((update.progress - 0.625).abs() < 1e-6);
    }

    #[test]
    fn test_progress_update_with_column() {
        let update = ProgressUpdate::with_column(
            TableKind::PreviousApplication,
            CleaningStage::DateReconstruction,
            "DAYS_DECISION",
            3,
            6,
            "Reconstructing DAYS_DECISION",
        );
        assert_eq!(update.table, TableKind::PreviousApplication);
        assert_eq!(update.column.as_deref(), Some("DAYS_DECISION"));
        assert_eq!(update.stage_progress, 0.5);
        assert_eq!(update.items_processed, Some(3));
        assert_eq!(update.items_total, Some(6));
    }

    #[test]
    fn test_progress_update_terminal_states() {
        let done = ProgressUpdate::complete(TableKind::Application, "Done");
        assert_eq!(done.progress, 1.0);

        let failed = ProgressUpdate::failed(TableKind::Application, "boom");
        assert_eq!(failed.stage, CleaningStage::Failed);
        assert_eq!(failed.progress, 0.0);
    }

    #[test]
    fn test_stage_weights_sum() {
        let stages = [
            CleaningStage::Initializing,
            CleaningStage::ReducingMissing,
            CleaningStage::Imputation,
            CleaningStage::OutlierFiltering,
            CleaningStage::DateReconstruction,
        ];

        let total_weight: f32 = stages.iter().map(|s| s.weight()).sum();
        assert!((total_weight - 1.0).abs() < 0.01, "Weights should sum to ~1.0");

        // each stage starts where the previous one ends
        for pair in stages.windows(2) {
            let end = pair[0].base_progress() + pair[0].weight();
            assert!((end - pair[1].base_progress()).abs() < 1e-6);
        }
    }

    #[test]
    fn test_closure_progress_reporter_across_threads() {
        let call_count = Arc::new(AtomicUsize::new(0));
        let call_count_clone = call_count.clone();

        let reporter = Arc::new(ClosureProgressReporter::new(move |_update| {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
        }));

        std::thread::scope(|s| {
            for table in [TableKind::Application, TableKind::PreviousApplication] {
                let reporter = reporter.clone();
                s.spawn(move || reporter.report(ProgressUpdate::complete(table, "Done")));
            }
        });

        assert_eq!(call_count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_progress_update_json_serialization() {
        let update = ProgressUpdate::with_column(
            TableKind::Application,
            CleaningStage::Imputation,
            "EXT_SOURCE_1",
            1,
            3,
            "Median fill",
        );

        let json = serde_json::to_string(&update).unwrap();
        assert!(json.contains("\"table\":\"application\""));
        assert!(json.contains("\"stage\":\"imputation\""));
        assert!(json.contains("\"column\":\"EXT_SOURCE_1\""));

        let back: ProgressUpdate = serde_json::from_str(&json).unwrap();
        assert_eq!(back.stage, CleaningStage::Imputation);
        assert_eq!(back.items_total, Some(3));
    }
}
