//! Main cleaning pipeline module.
//!
//! This module provides the [`CleaningPipeline`] struct and its builder,
//! which run the fixed cleaning sequence for each of the two tables.

use crate::cleaner::{DateReconstructor, MissingValueReducer};
use crate::config::{CleaningConfig, ConfigValidationError, DateColumn};
use crate::error::{CleaningError, Result};
use crate::imputers::{GroupedModeImputer, StatisticalImputer};
use crate::pipeline::OutlierHandler;
use crate::pipeline::progress::{
    CleaningStage, ClosureProgressReporter, ProgressReporter, ProgressUpdate,
};
use crate::types::{
    ActionType, CleaningAction, CleaningResult, CleaningSummary, ImputationRecord, TableKind,
};
use polars::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Share of removed rows above which a run is flagged in the summary.
const HIGH_ROW_LOSS_PERCENT: f32 = 30.0;

/// The cleaning pipeline for the application and previous-application
/// tables.
///
/// Use [`CleaningPipeline::builder()`] to create a pipeline with custom
/// configuration.
///
/// # Example
///
/// ```rust,ignore
/// use loan_processing::{CleaningConfig, CleaningPipeline};
///
/// let pipeline = CleaningPipeline::builder()
///     .config(CleaningConfig::builder().iqr_multiplier(3.0).build()?)
///     .on_progress(|update| {
///         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
///     })
///     .build()?;
///
/// let application = pipeline.clean_application(application_df)?;
/// let previous = pipeline.clean_previous_application(previous_df)?;
/// ```
pub struct CleaningPipeline {
    config: CleaningConfig,
    dates: DateReconstructor,
    descriptions: HashMap<String, String>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
}

// Both tables are cleaned concurrently from one shared pipeline.
static_assertions::assert_impl_all!(CleaningPipeline: Send, Sync);

impl CleaningPipeline {
    /// Create a new pipeline builder.
    pub fn builder() -> CleaningPipelineBuilder {
        CleaningPipelineBuilder::default()
    }

    pub fn config(&self) -> &CleaningConfig {
        &self.config
    }

    pub fn date_reconstructor(&self) -> &DateReconstructor {
        &self.dates
    }

    /// Clean `df` as the given table.
    pub fn clean(&self, table: TableKind, df: DataFrame) -> Result<CleaningResult> {
        let outcome = match table {
            TableKind::Application => self.clean_application_internal(df),
            TableKind::PreviousApplication => self.clean_previous_internal(df),
        };

        match outcome {
            Ok(result) => {
                self.report_progress(ProgressUpdate::complete(
                    table,
                    format!("{} cleaned", table),
                ));
                Ok(result)
            }
            Err(e) => {
                self.report_progress(ProgressUpdate::failed(table, e.to_string()));
                error!("Cleaning {} failed: {}", table, e);
                Err(e)
            }
        }
    }

    /// Application table: drop mostly-empty columns, median fill, group
    /// mode fill, outlier filter, date reconstruction.
    pub fn clean_application(&self, df: DataFrame) -> Result<CleaningResult> {
        self.clean(TableKind::Application, df)
    }

    /// Previous-application table: median/mode fallback fill, then date
    /// reconstruction.
    pub fn clean_previous_application(&self, df: DataFrame) -> Result<CleaningResult> {
        self.clean(TableKind::PreviousApplication, df)
    }

    fn report_progress(&self, update: ProgressUpdate) {
        if let Some(reporter) = &self.progress_reporter {
            reporter.report(update);
        }
    }

    fn clean_application_internal(&self, mut df: DataFrame) -> Result<CleaningResult> {
        let table = TableKind::Application;
        let start_time = Instant::now();
        let mut summary = self.start(table, &df);

        // Step 1: drop columns above the missing threshold
        self.report_progress(ProgressUpdate::new(
            table,
            CleaningStage::ReducingMissing,
            0.0,
            "Dropping mostly-empty columns...",
        ));
        info!("[{}] Step 1: Dropping columns with too many missing values...", table);
        self.drop_missing_columns(&mut df, &mut summary)?;

        self.report_progress(ProgressUpdate::new(
            table,
            CleaningStage::ReducingMissing,
            1.0,
            format!("Dropped {} columns", summary.dropped_columns.len()),
        ));

        // Step 2: median fill, then group-conditional mode fill
        info!("[{}] Step 2: Imputing missing values...", table);
        let total = self.config.median_columns.len() + self.config.group_fills.len();
        let mut done = 0;

        for col_name in &self.config.median_columns {
            self.report_progress(ProgressUpdate::with_column(
                table,
                CleaningStage::Imputation,
                col_name,
                done,
                total,
                format!("Median fill of {}", col_name),
            ));
            match StatisticalImputer::apply_numeric_median(&mut df, col_name) {
                Ok(record) => self.record_imputation(&mut summary, record),
                Err(e) => self.skip_step(&mut summary, table, "median fill", e)?,
            }
            done += 1;
        }

        for fill in &self.config.group_fills {
            self.report_progress(ProgressUpdate::with_column(
                table,
                CleaningStage::Imputation,
                &fill.target,
                done,
                total,
                format!("Mode fill of {} by {}", fill.target, fill.group_by),
            ));
            match GroupedModeImputer::apply(&mut df, fill) {
                Ok(record) => self.record_imputation(&mut summary, record),
                Err(e) => self.skip_step(&mut summary, table, "group mode fill", e)?,
            }
            done += 1;
        }

        // Step 3: IQR outlier filter, one column after another
        self.report_progress(ProgressUpdate::new(
            table,
            CleaningStage::OutlierFiltering,
            0.0,
            "Removing outliers...",
        ));
        info!("[{}] Step 3: Removing outliers...", table);

        let removals = OutlierHandler::remove_outliers(
            &mut df,
            &self.config.outlier_columns,
            self.config.iqr_multiplier,
        )?;
        for removal in &removals {
            if removal.rows_removed > 0 {
                summary.add_action(CleaningAction::new(
                    ActionType::RowsRemoved,
                    &removal.column,
                    format!(
                        "Removed {} rows outside [{:.2}, {:.2}] in '{}'",
                        removal.rows_removed, removal.lower_bound, removal.upper_bound, removal.column
                    ),
                ));
            }
        }
        summary.outliers_removed = removals;

        // Row removal can push a kept column over the missing threshold
        let late = self.drop_missing_columns(&mut df, &mut summary)?;
        if late > 0 {
            info!(
                "[{}] Dropped {} more columns after outlier filtering",
                table, late
            );
        }

        self.report_progress(ProgressUpdate::new(
            table,
            CleaningStage::OutlierFiltering,
            1.0,
            "Outlier filter complete",
        ));

        // Step 4: calendar dates from day offsets
        info!("[{}] Step 4: Reconstructing dates...", table);
        self.reconstruct_dates(table, &mut df, &self.config.application_dates, &mut summary)?;

        Ok(self.finish(table, df, summary, start_time))
    }

    fn clean_previous_internal(&self, mut df: DataFrame) -> Result<CleaningResult> {
        let table = TableKind::PreviousApplication;
        let start_time = Instant::now();
        let mut summary = self.start(table, &df);

        // Step 1: blanket median/mode fill
        self.report_progress(ProgressUpdate::new(
            table,
            CleaningStage::Imputation,
            0.0,
            "Filling remaining missing values...",
        ));
        info!("[{}] Step 1: Filling missing values with median/mode...", table);

        for record in StatisticalImputer::fill_remaining(&mut df)? {
            if record.values_filled == 0 {
                let message = format!("No values to impute '{}' from, left as-is", record.column);
                warn!("[{}] {}", table, message);
                summary.add_warning(message);
            }
            self.record_imputation(&mut summary, record);
        }

        self.report_progress(ProgressUpdate::new(
            table,
            CleaningStage::Imputation,
            1.0,
            format!("Imputed {} values", summary.total_imputed()),
        ));

        // Step 2: calendar dates from day offsets
        info!("[{}] Step 2: Reconstructing dates...", table);
        self.reconstruct_dates(table, &mut df, &self.config.previous_dates, &mut summary)?;

        Ok(self.finish(table, df, summary, start_time))
    }

    fn start(&self, table: TableKind, df: &DataFrame) -> CleaningSummary {
        info!("Cleaning {} ({} rows x {} columns)...", table, df.height(), df.width());
        self.report_progress(ProgressUpdate::new(
            table,
            CleaningStage::Initializing,
            0.0,
            format!("Cleaning {}...", table),
        ));

        let mut summary = CleaningSummary::new();
        summary.rows_before = df.height();
        summary.columns_before = df.width();
        summary
    }

    fn finish(
        &self,
        table: TableKind,
        df: DataFrame,
        mut summary: CleaningSummary,
        start_time: Instant,
    ) -> CleaningResult {
        summary.duration_ms = start_time.elapsed().as_millis() as u64;
        summary.rows_after = df.height();
        summary.columns_after = df.width();

        if summary.rows_removed_percentage() > HIGH_ROW_LOSS_PERCENT {
            summary.add_warning(format!(
                "High data loss: {:.1}% of rows were removed",
                summary.rows_removed_percentage()
            ));
        }

        info!(
            "Cleaned {}: {} rows x {} columns in {}ms",
            table, summary.rows_after, summary.columns_after, summary.duration_ms
        );

        CleaningResult {
            table,
            data: df,
            summary,
        }
    }

    /// Drop application columns above the missing threshold, appending
    /// them to `summary.dropped_columns`. Returns how many were dropped.
    ///
    /// Reconstructed date columns are regenerated later in the run and are
    /// never dropped here.
    fn drop_missing_columns(
        &self,
        df: &mut DataFrame,
        summary: &mut CleaningSummary,
    ) -> Result<usize> {
        let date_targets: Vec<&str> = self
            .config
            .application_dates
            .iter()
            .map(|c| c.target.as_str())
            .collect();

        let mut dropped = MissingValueReducer::drop_high_missing_columns_except(
            df,
            self.config.missing_column_threshold,
            &date_targets,
        )?;
        for column in &mut dropped {
            column.description = self.descriptions.get(&column.name).cloned();
            summary.add_action(CleaningAction::new(
                ActionType::ColumnRemoved,
                &column.name,
                format!(
                    "Dropped '{}' ({:.1}% missing)",
                    column.name,
                    column.missing_fraction * 100.0
                ),
            ));
        }

        let count = dropped.len();
        summary.dropped_columns.extend(dropped);
        Ok(count)
    }

    fn reconstruct_dates(
        &self,
        table: TableKind,
        df: &mut DataFrame,
        columns: &[DateColumn],
        summary: &mut CleaningSummary,
    ) -> Result<()> {
        for (idx, column) in columns.iter().enumerate() {
            self.report_progress(ProgressUpdate::with_column(
                table,
                CleaningStage::DateReconstruction,
                &column.source,
                idx,
                columns.len(),
                format!("{} -> {}", column.source, column.target),
            ));

            match self.dates.reconstruct(df, column) {
                Ok(stats) => {
                    summary.add_action(CleaningAction::new(
                        ActionType::DateReconstructed,
                        &stats.target,
                        format!(
                            "Derived '{}' from '{}' ({} dates, {} missing)",
                            stats.target,
                            stats.source,
                            stats.mapped,
                            stats.missing()
                        ),
                    ));
                    summary.reconstructed_dates.push(stats);
                }
                Err(e) => self.skip_step(summary, table, "date reconstruction", e)?,
            }
        }
        Ok(())
    }

    fn record_imputation(&self, summary: &mut CleaningSummary, record: ImputationRecord) {
        if record.values_filled > 0 {
            summary.add_action(CleaningAction::new(
                ActionType::ValueImputed,
                &record.column,
                format!(
                    "Filled {} missing values in '{}' with {}",
                    record.values_filled, record.column, record.method
                ),
            ));
        }
        summary.imputations.push(record);
    }

    /// Record a skipped step, or propagate the error if it is not one a
    /// step may skip over.
    fn skip_step(
        &self,
        summary: &mut CleaningSummary,
        table: TableKind,
        step: &str,
        err: CleaningError,
    ) -> Result<()> {
        if !err.is_skippable() {
            return Err(err.with_context(format!("{} of {}", step, table)));
        }

        let message = format!("Skipped {}: {}", step, err);
        warn!("[{}] {}", table, message);
        debug!("[{}] skip cause: {:?}", table, err);

        summary.add_action(CleaningAction::new(ActionType::StepSkipped, "table", &message));
        summary.add_warning(message);
        Ok(())
    }
}

/// Builder for creating a [`CleaningPipeline`] instance.
///
/// Use [`CleaningPipeline::builder()`] to get started.
#[derive(Default)]
pub struct CleaningPipelineBuilder {
    config: Option<CleaningConfig>,
    descriptions: Option<HashMap<String, String>>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
}

static_assertions::assert_impl_all!(CleaningPipelineBuilder: Send);

impl CleaningPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: CleaningConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Column name -> human description, used to annotate dropped columns.
    pub fn column_descriptions(mut self, descriptions: HashMap<String, String>) -> Self {
        self.descriptions = Some(descriptions);
        self
    }

    /// Set a progress reporter for receiving updates during processing.
    pub fn progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    /// Set a progress callback closure.
    ///
    /// For more complex scenarios, use [`progress_reporter`](Self::progress_reporter).
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_reporter = Some(Arc::new(ClosureProgressReporter::new(callback)));
        self
    }

    /// Build the pipeline.
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> std::result::Result<CleaningPipeline, ConfigValidationError> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        Ok(CleaningPipeline {
            dates: DateReconstructor::from_config(&config),
            config,
            descriptions: self.descriptions.unwrap_or_default(),
            progress_reporter: self.progress_reporter,
        })
    }
}
