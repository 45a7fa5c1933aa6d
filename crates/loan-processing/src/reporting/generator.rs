use crate::error::Result;
use crate::types::{CleaningResult, CleaningSummary, TableKind};
use chrono::{Local, NaiveDate};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

// ============================================================================
// Report Types
// ============================================================================

/// Machine-readable record of one cleaning run.
///
/// Used for both JSON output (`--json`) and file writing (`--emit-report`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleaningReport {
    /// Timestamp when the report was generated
    pub generated_at: String,
    /// Reference date used for all reconstructed dates
    pub reference_date: String,
    pub tables: Vec<TableReport>,
}

impl CleaningReport {
    pub fn table(&self, kind: TableKind) -> Option<&TableReport> {
        self.tables.iter().find(|t| t.table == kind)
    }
}

/// Per-table section of a [`CleaningReport`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableReport {
    pub table: TableKind,
    pub input_file: String,
    /// Path of the cleaned CSV, if one was written
    pub output_file: Option<String>,
    /// (rows, columns) after cleaning
    pub final_shape: (usize, usize),
    pub rows_removed_percent: f32,
    pub summary: CleaningSummary,
}

impl TableReport {
    pub fn from_result(
        result: &CleaningResult,
        input_file: impl Into<String>,
        output_file: Option<&Path>,
    ) -> Self {
        Self {
            table: result.table,
            input_file: input_file.into(),
            output_file: output_file.map(|p| p.display().to_string()),
            final_shape: result.data.shape(),
            rows_removed_percent: result.summary.rows_removed_percentage(),
            summary: result.summary.clone(),
        }
    }
}

// ============================================================================
// Generator
// ============================================================================

/// Writes cleaned tables and run reports into one output directory.
pub struct ReportGenerator {
    output_dir: PathBuf,
}

impl ReportGenerator {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Path a file named `file_name` will be written to.
    pub fn output_path(&self, file_name: &str) -> PathBuf {
        self.output_dir.join(file_name)
    }

    /// Write a cleaned table as CSV with a header row.
    ///
    /// Missing values, including unreconstructable dates, are written as
    /// empty fields; dates are written as `YYYY-MM-DD`.
    pub fn write_table(&self, df: &mut DataFrame, file_name: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.output_dir)?;
        let output_path = self.output_path(file_name);
        let mut file = File::create(&output_path)?;

        CsvWriter::new(&mut file)
            .include_header(true)
            .with_separator(b',')
            .with_quote_char(b'"')
            .finish(df)?;

        info!(
            "Saved {} ({} rows x {} columns)",
            output_path.display(),
            df.height(),
            df.width()
        );
        Ok(output_path)
    }

    /// Assemble a report from the per-table sections.
    pub fn build_report(reference_date: NaiveDate, tables: Vec<TableReport>) -> CleaningReport {
        CleaningReport {
            generated_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            reference_date: reference_date.to_string(),
            tables,
        }
    }

    /// Write a report to `<report_base_name>_report.json` in the output
    /// directory.
    pub fn write_report_to_file(
        &self,
        report: &CleaningReport,
        report_base_name: &str,
    ) -> Result<PathBuf> {
        fs::create_dir_all(&self.output_dir)?;

        let report_path = self
            .output_dir
            .join(format!("{}_report.json", report_base_name));
        let mut file = File::create(&report_path)?;
        file.write_all(serde_json::to_string_pretty(report)?.as_bytes())?;

        info!("Report saved: {}", report_path.display());

        Ok(report_path)
    }
}
