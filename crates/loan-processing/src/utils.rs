//! Dtype checks and Series helpers shared by the cleaning steps.

use polars::prelude::*;
use std::collections::HashMap;

// =============================================================================
// Data Type Utilities
// =============================================================================

/// Category of a data type for cleaning purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DtypeCategory {
    /// Integer or floating point numbers
    Numeric,
    /// Date or datetime types
    Datetime,
    /// Boolean type
    Boolean,
    /// String/text type
    String,
    /// Other/unknown types
    Other,
}

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Check if a DataType is a datetime type.
#[inline]
pub fn is_datetime_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Datetime(_, _) | DataType::Date | DataType::Time
    )
}

/// Get the category of a DataType.
pub fn get_dtype_category(dtype: &DataType) -> DtypeCategory {
    if is_numeric_dtype(dtype) {
        DtypeCategory::Numeric
    } else if is_datetime_dtype(dtype) {
        DtypeCategory::Datetime
    } else if matches!(dtype, DataType::Boolean) {
        DtypeCategory::Boolean
    } else if matches!(dtype, DataType::String | DataType::Categorical(_, _)) {
        DtypeCategory::String
    } else {
        DtypeCategory::Other
    }
}

// =============================================================================
// Frame Utilities
// =============================================================================

/// Owned column names of a DataFrame, in schema order.
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[inline]
pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_index(name).is_some()
}

/// Missing entries of a Series: nulls, plus NaN in float columns.
pub fn missing_count(series: &Series) -> usize {
    let nan_count = match series.dtype() {
        DataType::Float32 | DataType::Float64 => series
            .cast(&DataType::Float64)
            .ok()
            .and_then(|floats| {
                floats
                    .f64()
                    .ok()
                    .map(|ca| ca.into_iter().flatten().filter(|v| v.is_nan()).count())
            })
            .unwrap_or(0),
        _ => 0,
    };
    series.null_count() + nan_count
}

/// Fraction of missing entries (see [`missing_count`]); 0.0 for an empty
/// Series.
pub fn null_fraction(series: &Series) -> f64 {
    if series.is_empty() {
        0.0
    } else {
        missing_count(series) as f64 / series.len() as f64
    }
}

// =============================================================================
// Series Statistics Utilities
// =============================================================================

/// Median of the non-missing values, after casting to Float64.
pub fn numeric_median(series: &Series) -> Option<f64> {
    let floats = series.cast(&DataType::Float64).ok()?;
    let observed: Float64Chunked = floats
        .f64()
        .ok()?
        .into_iter()
        .map(|v| v.filter(|x| !x.is_nan()))
        .collect();
    observed.into_series().median()
}

/// Calculate the mode (most frequent value) of a Series as a string.
///
/// Ties go to the value seen first in row order. This differs from a
/// sorted-mode convention, which would pick the smallest tied value.
pub fn string_mode(series: &Series) -> Option<String> {
    let str_series = series.cast(&DataType::String).ok()?;
    let str_chunked = str_series.str().ok()?;
    mode_of(str_chunked.into_iter().flatten()).map(str::to_string)
}

/// Mode of a sequence of values with first-occurrence tie breaking.
pub(crate) fn mode_of<'a, I>(values: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    // value -> (count, first position)
    let mut counts: HashMap<&'a str, (usize, usize)> = HashMap::new();
    for (idx, val) in values.into_iter().enumerate() {
        counts.entry(val).or_insert((0, idx)).0 += 1;
    }

    counts
        .into_iter()
        .max_by(|(_, (count_a, first_a)), (_, (count_b, first_b))| {
            count_a.cmp(count_b).then(first_b.cmp(first_a))
        })
        .map(|(val, _)| val)
}

// =============================================================================
// Series Transformation Utilities
// =============================================================================

/// Fill null and NaN values in a numeric Series with a specific value.
///
/// The result is Float64 regardless of the input numeric type.
pub fn fill_numeric_nulls(series: &Series, fill_value: f64) -> PolarsResult<Series> {
    let floats = series.cast(&DataType::Float64)?;
    let filled: Float64Chunked = floats
        .f64()?
        .into_iter()
        .map(|v| Some(v.filter(|x| !x.is_nan()).unwrap_or(fill_value)))
        .collect();

    Ok(filled.with_name(series.name().clone()).into_series())
}

/// Fill null values in a string Series with a specific value.
pub fn fill_string_nulls(series: &Series, fill_value: &str) -> PolarsResult<Series> {
    let strings = series.cast(&DataType::String)?;
    let filled: StringChunked = strings
        .str()?
        .into_iter()
        .map(|v| Some(v.unwrap_or(fill_value)))
        .collect();

    Ok(filled.with_name(series.name().clone()).into_series())
}

// =============================================================================
// Tests
// =============================================================================
