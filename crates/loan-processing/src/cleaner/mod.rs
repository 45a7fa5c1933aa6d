//! Table-level cleaning operations.
//!
//! This module provides functionality for:
//! - Measuring the missing fraction of every column
//! - Dropping columns whose missing fraction exceeds a threshold
//! - Reconstructing calendar dates from day-offset columns

mod dates;

pub use dates::DateReconstructor;

use crate::error::Result;
use crate::types::DroppedColumn;
use crate::utils::null_fraction;
use polars::prelude::*;
use tracing::{debug, info};

/// Drops columns that are mostly empty.
pub struct MissingValueReducer;

impl MissingValueReducer {
    /// Missing fraction per column, sorted from most to least missing.
    ///
    /// Columns with equal fractions keep their schema order.
    pub fn missing_fractions(df: &DataFrame) -> Vec<(String, f64)> {
        let mut fractions: Vec<(String, f64)> = df
            .get_columns()
            .iter()
            .map(|col| {
                (
                    col.name().to_string(),
                    null_fraction(col.as_materialized_series()),
                )
            })
            .collect();

        fractions.sort_by(|a, b| b.1.total_cmp(&a.1));
        fractions
    }

    /// Drop every column whose missing fraction is strictly greater than
    /// `threshold`.
    ///
    /// Returns the dropped columns, most-missing first.
    pub fn drop_high_missing_columns(
        df: &mut DataFrame,
        threshold: f64,
    ) -> Result<Vec<DroppedColumn>> {
        Self::drop_high_missing_columns_except::<&str>(df, threshold, &[])
    }

    /// Like [`drop_high_missing_columns`](Self::drop_high_missing_columns),
    /// but never drops a column named in `keep`.
    pub fn drop_high_missing_columns_except<S: AsRef<str>>(
        df: &mut DataFrame,
        threshold: f64,
        keep: &[S],
    ) -> Result<Vec<DroppedColumn>> {
        let dropped: Vec<DroppedColumn> = Self::missing_fractions(df)
            .into_iter()
            .filter(|(_, fraction)| *fraction > threshold)
            .filter(|(name, _)| !keep.iter().any(|k| k.as_ref() == name))
            .map(|(name, missing_fraction)| DroppedColumn {
                name,
                missing_fraction,
                description: None,
            })
            .collect();

        if dropped.is_empty() {
            debug!("No columns with >{:.0}% missing values", threshold * 100.0);
            return Ok(dropped);
        }

        let cols_ref: Vec<PlSmallStr> = dropped.iter().map(|c| c.name.as_str().into()).collect();
        *df = df.drop_many(cols_ref);

        info!(
            "Dropped {} columns with >{:.0}% missing values",
            dropped.len(),
            threshold * 100.0
        );
        for col in &dropped {
            debug!("  {:<32} {:.6}", col.name, col.missing_fraction);
        }

        Ok(dropped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_frame() -> DataFrame {
        df![
            "SK_ID_CURR" => [1i64, 2, 3, 4, 5],
            "OWN_CAR_AGE" => [None, None, None, Some(4.0), None],
            "EXT_SOURCE_1" => [Some(0.1), None, None, Some(0.4), Some(0.5)],
            "EXT_SOURCE_2" => [Some(0.1), None, Some(0.3), Some(0.4), Some(0.5)],
        ]
        .unwrap()
    }

    #[test]
    fn test_missing_fractions_sorted_descending() {
        let df = sample_frame();
        let fractions = MissingValueReducer::missing_fractions(&df);

        assert_eq!(fractions[0], ("OWN_CAR_AGE".to_string(), 0.8));
        assert_eq!(fractions[1], ("EXT_SOURCE_1".to_string(), 0.4));
        assert_eq!(fractions[2], ("EXT_SOURCE_2".to_string(), 0.2));
        assert_eq!(fractions[3], ("SK_ID_CURR".to_string(), 0.0));
    }

    #[test]
    fn test_drop_is_strictly_greater_than_threshold() {
        let mut df = sample_frame();
        let dropped = MissingValueReducer::drop_high_missing_columns(&mut df, 0.4).unwrap();

        // EXT_SOURCE_1 sits exactly at 40% and is kept
        assert_eq!(dropped.len(), 1);
        assert_eq!(dropped[0].name, "OWN_CAR_AGE");
        assert!(df.column("OWN_CAR_AGE").is_err());
        assert!(df.column("EXT_SOURCE_1").is_ok());
        assert_eq!(df.width(), 3);
        assert_eq!(df.height(), 5);
    }

    #[test]
    fn test_drop_nothing_when_below_threshold() {
        let mut df = sample_frame();
        let dropped = MissingValueReducer::drop_high_missing_columns(&mut df, 0.9).unwrap();

        assert!(dropped.is_empty());
        assert_eq!(df.width(), 4);
    }

    #[test]
    fn test_drop_is_idempotent() {
        let mut df = sample_frame();
        MissingValueReducer::drop_high_missing_columns(&mut df, 0.3).unwrap();
        let width = df.width();

        let dropped_again = MissingValueReducer::drop_high_missing_columns(&mut df, 0.3).unwrap();
        assert!(dropped_again.is_empty());
        assert_eq!(df.width(), width);
    }

    #[test]
    fn test_drop_except_keeps_named_columns() {
        let mut df = sample_frame();
        let dropped =
            MissingValueReducer::drop_high_missing_columns_except(&mut df, 0.3, &["OWN_CAR_AGE"])
                .unwrap();

        assert_eq!(dropped.len(), 1);
        assert_eq!(dropped[0].name, "EXT_SOURCE_1");
        assert!(df.column("OWN_CAR_AGE").is_ok());
    }

    #[test]
    fn test_drop_on_empty_frame() {
        let mut df = DataFrame::empty();
        let dropped = MissingValueReducer::drop_high_missing_columns(&mut df, 0.4).unwrap();
        assert!(dropped.is_empty());
    }
}
