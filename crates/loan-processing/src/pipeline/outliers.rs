//! Outlier handling module.
//!
//! Rows whose value in a monitored numeric column falls outside the
//! interquartile fence `[Q1 - k*IQR, Q3 + k*IQR]` are removed. Columns are
//! filtered one after another, each on the table left by the previous one.

use crate::error::Result;
use crate::types::OutlierRemoval;
use crate::utils::is_numeric_dtype;
use polars::prelude::*;
use serde::Serialize;
use tracing::{debug, warn};

/// Quartiles and fence of one numeric column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IqrBounds {
    pub q1: f64,
    pub q3: f64,
    pub lower: f64,
    pub upper: f64,
}

impl IqrBounds {
    /// Inclusive containment check.
    #[inline]
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }

    pub fn iqr(&self) -> f64 {
        self.q3 - self.q1
    }
}

/// Handles outlier detection and treatment.
pub struct OutlierHandler;

impl OutlierHandler {
    /// Fence for `values` with multiplier `k`; `None` for an empty slice.
    ///
    /// Quartiles interpolate linearly between the closest order statistics.
    pub fn iqr_bounds(values: &[f64], multiplier: f64) -> Option<IqrBounds> {
        if values.is_empty() {
            return None;
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        let q1 = quantile_sorted(&sorted, 0.25);
        let q3 = quantile_sorted(&sorted, 0.75);
        let iqr = q3 - q1;

        Some(IqrBounds {
            q1,
            q3,
            lower: q1 - multiplier * iqr,
            upper: q3 + multiplier * iqr,
        })
    }

    /// Bounds for a column of `df` as it currently stands.
    ///
    /// Returns `Ok(None)` when the column is absent, not numeric, or holds no
    /// finite value.
    pub fn column_bounds(
        df: &DataFrame,
        col_name: &str,
        multiplier: f64,
    ) -> Result<Option<IqrBounds>> {
        let Ok(column) = df.column(col_name) else {
            return Ok(None);
        };
        if !is_numeric_dtype(column.dtype()) {
            return Ok(None);
        }

        let floats = column.as_materialized_series().cast(&DataType::Float64)?;
        let values: Vec<f64> = floats
            .f64()?
            .into_iter()
            .flatten()
            .filter(|v| v.is_finite())
            .collect();

        Ok(Self::iqr_bounds(&values, multiplier))
    }

    /// Remove rows outside the IQR fence of each column in `columns`, in
    /// order.
    ///
    /// A row with a missing value in a filtered column is removed as well.
    /// Absent columns are skipped silently; non-numeric or empty columns
    /// are skipped with a warning.
    pub fn remove_outliers<S: AsRef<str>>(
        df: &mut DataFrame,
        columns: &[S],
        multiplier: f64,
    ) -> Result<Vec<OutlierRemoval>> {
        let mut removals = Vec::with_capacity(columns.len());

        for col_name in columns.iter().map(AsRef::as_ref) {
            let Ok(column) = df.column(col_name) else {
                debug!("Outlier column '{}' not present, skipping", col_name);
                continue;
            };
            if !is_numeric_dtype(column.dtype()) {
                warn!(
                    "Outlier column '{}' is not numeric ({}), skipping",
                    col_name,
                    column.dtype()
                );
                continue;
            }

            let Some(bounds) = Self::column_bounds(df, col_name, multiplier)? else {
                warn!("Outlier column '{}' has no values, skipping", col_name);
                continue;
            };

            let floats = df
                .column(col_name)?
                .as_materialized_series()
                .cast(&DataType::Float64)?;
            let mask: BooleanChunked = floats
                .f64()?
                .into_iter()
                .map(|v| Some(v.is_some_and(|val| bounds.contains(val))))
                .collect();

            let before = df.height();
            *df = df.filter(&mask)?;
            let rows_removed = before - df.height();

            debug!(
                "{}: bounds [{:.4}, {:.4}], removed {} rows",
                col_name, bounds.lower, bounds.upper, rows_removed
            );

            removals.push(OutlierRemoval {
                column: col_name.to_string(),
                lower_bound: bounds.lower,
                upper_bound: bounds.upper,
                rows_removed,
            });
        }

        Ok(removals)
    }
}

/// Linear-interpolation quantile of an ascending, non-empty slice.
fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}
