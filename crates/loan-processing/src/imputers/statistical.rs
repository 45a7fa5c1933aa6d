//! Statistical imputation methods.
//!
//! Provides column-wise median and mode imputation, and the blanket
//! fallback that fills every remaining gap in a table with its own column
//! statistic.

use crate::error::{CleaningError, Result};
use crate::types::{ImputationMethod, ImputationRecord};
use crate::utils::{
    DtypeCategory, column_names, fill_numeric_nulls, fill_string_nulls, get_dtype_category,
    missing_count, numeric_median, string_mode,
};
use polars::prelude::*;
use tracing::debug;

/// Statistical imputation methods for filling missing values.
pub struct StatisticalImputer;

impl StatisticalImputer {
    /// Replace nulls and NaN in a numeric column with the column median.
    ///
    /// A column without any observed value is left untouched and reported
    /// with `values_filled == 0`.
    pub fn apply_numeric_median(df: &mut DataFrame, col_name: &str) -> Result<ImputationRecord> {
        let series = Self::series(df, col_name)?;
        let missing = missing_count(&series);

        let mut record = ImputationRecord {
            column: col_name.to_string(),
            method: ImputationMethod::Median,
            values_filled: 0,
            values_remaining: missing,
        };

        if missing == 0 {
            return Ok(record);
        }

        if let Some(median_val) = numeric_median(&series) {
            let filled = fill_numeric_nulls(&series, median_val)?;
            df.replace(col_name, filled)?;
            record.values_filled = missing;
            record.values_remaining = 0;
            debug!("Filled {} nulls in '{}' with median {:.4}", missing, col_name, median_val);
        }

        Ok(record)
    }

    /// Replace nulls in a categorical column with the column mode.
    pub fn apply_mode_imputation(df: &mut DataFrame, col_name: &str) -> Result<ImputationRecord> {
        let series = Self::series(df, col_name)?;
        let missing = series.null_count();

        let mut record = ImputationRecord {
            column: col_name.to_string(),
            method: ImputationMethod::Mode,
            values_filled: 0,
            values_remaining: missing,
        };

        if missing == 0 {
            return Ok(record);
        }

        if let Some(mode_val) = string_mode(&series) {
            let filled = fill_string_nulls(&series, &mode_val)?;
            df.replace(col_name, filled)?;
            record.values_filled = missing;
            record.values_remaining = 0;
            debug!("Filled {} nulls in '{}' with mode '{}'", missing, col_name, mode_val);
        }

        Ok(record)
    }

    /// Fill every remaining gap: numeric columns with their median, string
    /// columns with their mode. Other column types are left as they are.
    ///
    /// Only columns that had nulls appear in the returned records.
    pub fn fill_remaining(df: &mut DataFrame) -> Result<Vec<ImputationRecord>> {
        let mut records = Vec::new();

        for col_name in column_names(df) {
            let column = df.column(&col_name)?;
            if missing_count(column.as_materialized_series()) == 0 {
                continue;
            }

            let record = match get_dtype_category(column.dtype()) {
                DtypeCategory::Numeric => Self::apply_numeric_median(df, &col_name)?,
                DtypeCategory::String => Self::apply_mode_imputation(df, &col_name)?,
                other => {
                    debug!("Leaving nulls in '{}' ({:?} column)", col_name, other);
                    continue;
                }
            };
            records.push(record);
        }

        Ok(records)
    }

    fn series(df: &DataFrame, col_name: &str) -> Result<Series> {
        df.column(col_name)
            .map(|c| c.as_materialized_series().clone())
            .map_err(|_| CleaningError::MissingColumn(col_name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f64_values(df: &DataFrame, name: &str) -> Vec<Option<f64>> {
        df.column(name).unwrap().f64().unwrap().into_iter().collect()
    }

    fn str_values(df: &DataFrame, name: &str) -> Vec<Option<String>> {
        df.column(name)
            .unwrap()
            .str()
            .unwrap()
            .into_iter()
            .map(|v| v.map(str::to_string))
            .collect()
    }

    // ========================================================================
    // apply_numeric_median() tests
    // ========================================================================

    #[test]
    fn test_apply_numeric_median_basic() {
        let mut df = df![
            "EXT_SOURCE_2" => [Some(1.0), None, Some(3.0), None, Some(5.0)],
        ]
        .unwrap();

        let record = StatisticalImputer::apply_numeric_median(&mut df, "EXT_SOURCE_2").unwrap();

        assert_eq!(record.values_filled, 2);
        assert_eq!(record.values_remaining, 0);
        assert_eq!(
            f64_values(&df, "EXT_SOURCE_2"),
            vec![Some(1.0), Some(3.0), Some(3.0), Some(3.0), Some(5.0)]
        );
    }

    #[test]
    fn test_apply_numeric_median_even_count() {
        let mut df = df!["v" => [Some(1.0), None, Some(3.0)]].unwrap();
        StatisticalImputer::apply_numeric_median(&mut df, "v").unwrap();
        assert_eq!(f64_values(&df, "v")[1], Some(2.0));
    }

    #[test]
    fn test_apply_numeric_median_no_nulls() {
        let mut df = df!["v" => [1i64, 2, 3]].unwrap();
        let record = StatisticalImputer::apply_numeric_median(&mut df, "v").unwrap();

        assert_eq!(record.values_filled, 0);
        // untouched, including dtype
        assert_eq!(df.column("v").unwrap().dtype(), &DataType::Int64);
    }

    #[test]
    fn test_apply_numeric_median_all_nulls() {
        let mut df = df!["v" => [Option::<f64>::None, None, None]].unwrap();
        let record = StatisticalImputer::apply_numeric_median(&mut df, "v").unwrap();

        assert_eq!(record.values_filled, 0);
        assert_eq!(record.values_remaining, 3);
    }

    #[test]
    fn test_apply_numeric_median_fills_nan() {
        let mut df = df!["EXT_SOURCE_3" => [Some(0.2), Some(f64::NAN), None, Some(0.6)]].unwrap();
        let record = StatisticalImputer::apply_numeric_median(&mut df, "EXT_SOURCE_3").unwrap();

        assert_eq!(record.values_filled, 2);
        assert_eq!(
            f64_values(&df, "EXT_SOURCE_3"),
            vec![Some(0.2), Some(0.4), Some(0.4), Some(0.6)]
        );
    }

    #[test]
    fn test_apply_numeric_median_missing_column() {
        let mut df = df!["other" => [1.0, 2.0]].unwrap();
        let err = StatisticalImputer::apply_numeric_median(&mut df, "EXT_SOURCE_3").unwrap_err();
        assert!(matches!(err, CleaningError::MissingColumn(_)));
    }

    // ========================================================================
    // apply_mode_imputation() tests
    // ========================================================================

    #[test]
    fn test_apply_mode_imputation_basic() {
        let mut df = df![
            "NAME_TYPE_SUITE" => [Some("Family"), Some("Unaccompanied"), Some("Unaccompanied"), None],
        ]
        .unwrap();

        let record = StatisticalImputer::apply_mode_imputation(&mut df, "NAME_TYPE_SUITE").unwrap();

        assert_eq!(record.values_filled, 1);
        assert_eq!(
            str_values(&df, "NAME_TYPE_SUITE")[3],
            Some("Unaccompanied".to_string())
        );
    }

    #[test]
    fn test_apply_mode_imputation_tie_uses_first_seen() {
        let mut df = df!["c" => [Some("B"), Some("A"), None]].unwrap();
        StatisticalImputer::apply_mode_imputation(&mut df, "c").unwrap();
        assert_eq!(str_values(&df, "c")[2], Some("B".to_string()));
    }

    // ========================================================================
    // fill_remaining() tests
    // ========================================================================

    #[test]
    fn test_fill_remaining_mixed_table() {
        let mut df = df![
            "SK_ID_PREV" => [1i64, 2, 3, 4],
            "AMT_ANNUITY" => [Some(10.0), None, Some(30.0), Some(20.0)],
            "NAME_TYPE_SUITE" => [None, Some("Family"), Some("Family"), Some("Spouse")],
            "RATE_DOWN_PAYMENT" => [Option::<f64>::None, None, None, None],
        ]
        .unwrap();

        let records = StatisticalImputer::fill_remaining(&mut df).unwrap();

        // SK_ID_PREV had no nulls and is not reported
        assert_eq!(records.len(), 3);
        assert_eq!(f64_values(&df, "AMT_ANNUITY")[1], Some(20.0));
        assert_eq!(str_values(&df, "NAME_TYPE_SUITE")[0], Some("Family".to_string()));

        // all-null column cannot be filled
        let empty = records
            .iter()
            .find(|r| r.column == "RATE_DOWN_PAYMENT")
            .unwrap();
        assert_eq!(empty.values_filled, 0);
        assert_eq!(empty.values_remaining, 4);
        assert_eq!(df.column("RATE_DOWN_PAYMENT").unwrap().null_count(), 4);
    }

    #[test]
    fn test_fill_remaining_on_clean_table() {
        let mut df = df!["a" => [1.0, 2.0], "b" => ["x", "y"]].unwrap();
        let records = StatisticalImputer::fill_remaining(&mut df).unwrap();
        assert!(records.is_empty());
    }
}
