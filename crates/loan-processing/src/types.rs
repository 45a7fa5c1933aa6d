use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The two tables the pipeline knows how to clean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    /// One row per applicant.
    Application,
    /// One row per historical loan, keyed by applicant id.
    PreviousApplication,
}

impl TableKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Application => "application_data",
            Self::PreviousApplication => "previous_application",
        }
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Result of cleaning a single table.
#[derive(Debug, Clone)]
pub struct CleaningResult {
    pub table: TableKind,
    pub data: DataFrame,
    pub summary: CleaningSummary,
}

/// Summary of everything done to one table.
///
/// # Example
///
/// ```rust,ignore
/// let result = pipeline.clean_application(df)?;
/// let summary = &result.summary;
/// println!("{} -> {} rows", summary.rows_before, summary.rows_after);
/// for removal in &summary.outliers_removed {
///     println!("{}: removed {} outliers", removal.column, removal.rows_removed);
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CleaningSummary {
    /// Total execution time in milliseconds.
    pub duration_ms: u64,

    pub rows_before: usize,
    pub rows_after: usize,
    pub columns_before: usize,
    pub columns_after: usize,

    /// Columns dropped for exceeding the missing threshold, with the
    /// missing fraction they had.
    pub dropped_columns: Vec<DroppedColumn>,

    /// Per-column imputation counts.
    pub imputations: Vec<ImputationRecord>,

    /// Rows removed per outlier-filtered column, in filter order.
    pub outliers_removed: Vec<OutlierRemoval>,

    /// Per-column date reconstruction statistics.
    pub reconstructed_dates: Vec<DateReconstruction>,

    /// Audit trail of actions taken.
    pub actions: Vec<CleaningAction>,

    /// Steps that were skipped or degraded.
    pub warnings: Vec<String>,
}

impl CleaningSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_action(&mut self, action: CleaningAction) {
        self.actions.push(action);
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    pub fn rows_removed(&self) -> usize {
        self.rows_before.saturating_sub(self.rows_after)
    }

    pub fn total_imputed(&self) -> usize {
        self.imputations.iter().map(|r| r.values_filled).sum()
    }

    /// Calculate the percentage of rows removed.
    pub fn rows_removed_percentage(&self) -> f32 {
        if self.rows_before == 0 {
            0.0
        } else {
            (self.rows_removed() as f32 / self.rows_before as f32) * 100.0
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DroppedColumn {
    pub name: String,
    pub missing_fraction: f64,
    /// Human description from the column description file, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImputationMethod {
    Median,
    Mode,
    GroupMode,
}

impl fmt::Display for ImputationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Median => f.write_str("median"),
            Self::Mode => f.write_str("mode"),
            Self::GroupMode => f.write_str("group mode"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImputationRecord {
    pub column: String,
    pub method: ImputationMethod,
    pub values_filled: usize,
    /// Nulls left behind (e.g. groups without any observed value).
    pub values_remaining: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierRemoval {
    pub column: String,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub rows_removed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateReconstruction {
    pub source: String,
    pub target: String,
    /// Offsets mapped to a calendar date.
    pub mapped: usize,
    /// Offsets outside the validity window (sentinel included).
    pub out_of_window: usize,
    /// Of `out_of_window`, how many were the sentinel placeholder.
    pub sentinel: usize,
    /// Missing or non-integral offsets.
    pub invalid: usize,
}

impl DateReconstruction {
    pub fn missing(&self) -> usize {
        self.out_of_window + self.invalid
    }
}

/// A single action taken during cleaning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleaningAction {
    pub action_type: ActionType,
    /// Column name or "table".
    pub target: String,
    pub description: String,
}

impl CleaningAction {
    pub fn new(
        action_type: ActionType,
        target: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            action_type,
            target: target.into(),
            description: description.into(),
        }
    }
}

impl fmt::Display for CleaningAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.action_type.display_name(), self.description)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    ColumnRemoved,
    RowsRemoved,
    ValueImputed,
    DateReconstructed,
    StepSkipped,
}

impl ActionType {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::ColumnRemoved => "Column Removed",
            Self::RowsRemoved => "Rows Removed",
            Self::ValueImputed => "Value Imputed",
            Self::DateReconstructed => "Date Reconstructed",
            Self::StepSkipped => "Step Skipped",
        }
    }
}
