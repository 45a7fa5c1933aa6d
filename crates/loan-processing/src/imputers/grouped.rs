//! Group-conditional mode imputation.
//!
//! A missing categorical value is filled with the most frequent value of
//! the same column among rows that share the value of a related grouping
//! column, e.g. a missing occupation is filled with the most common
//! occupation of applicants with the same income type.

use crate::config::GroupFill;
use crate::error::{CleaningError, Result};
use crate::types::{ImputationMethod, ImputationRecord};
use crate::utils::mode_of;
use polars::prelude::*;
use std::collections::HashMap;
use tracing::debug;

/// Fills nulls with the per-group mode.
pub struct GroupedModeImputer;

impl GroupedModeImputer {
    /// Fill nulls in `fill.target` with the mode of `fill.target` within the
    /// row's `fill.group_by` group.
    ///
    /// Groups without any observed target value and rows with a null group
    /// key are left as they are. The target column becomes a String column.
    ///
    /// # Errors
    ///
    /// [`CleaningError::MissingColumn`] if either column is absent.
    pub fn apply(df: &mut DataFrame, fill: &GroupFill) -> Result<ImputationRecord> {
        let target = Self::string_series(df, &fill.target)?;
        let groups = Self::string_series(df, &fill.group_by)?;
        let target_ca = target.str()?;
        let groups_ca = groups.str()?;

        let missing = target_ca.null_count();
        let mut record = ImputationRecord {
            column: fill.target.clone(),
            method: ImputationMethod::GroupMode,
            values_filled: 0,
            values_remaining: missing,
        };
        if missing == 0 {
            return Ok(record);
        }

        let modes = Self::group_modes(groups_ca, target_ca);

        let mut filled = 0usize;
        let result: StringChunked = target_ca
            .into_iter()
            .zip(groups_ca)
            .map(|(value, group)| match (value, group) {
                (Some(v), _) => Some(v),
                (None, Some(g)) => {
                    let mode = modes.get(g).copied();
                    if mode.is_some() {
                        filled += 1;
                    }
                    mode
                }
                (None, None) => None,
            })
            .collect();

        df.with_column(result.with_name(fill.target.as_str().into()).into_series())?;

        record.values_filled = filled;
        record.values_remaining = missing - filled;
        debug!(
            "Filled {} of {} nulls in '{}' by mode within '{}' ({} groups)",
            filled,
            missing,
            fill.target,
            fill.group_by,
            modes.len()
        );

        Ok(record)
    }

    /// Most frequent non-null target value per non-null group key.
    fn group_modes<'a>(
        groups: &'a StringChunked,
        target: &'a StringChunked,
    ) -> HashMap<&'a str, &'a str> {
        let mut observed: HashMap<&'a str, Vec<&'a str>> = HashMap::new();
        for (group, value) in groups.into_iter().zip(target) {
            if let (Some(g), Some(v)) = (group, value) {
                observed.entry(g).or_default().push(v);
            }
        }

        observed
            .into_iter()
            .filter_map(|(group, values)| mode_of(values).map(|mode| (group, mode)))
            .collect()
    }

    fn string_series(df: &DataFrame, name: &str) -> Result<Series> {
        let column = df
            .column(name)
            .map_err(|_| CleaningError::MissingColumn(name.to_string()))?;
        Ok(column.as_materialized_series().cast(&DataType::String)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn values(df: &DataFrame, name: &str) -> Vec<Option<String>> {
        df.column(name)
            .unwrap()
            .str()
            .unwrap()
            .into_iter()
            .map(|v| v.map(str::to_string))
            .collect()
    }

    fn occupation_fill() -> GroupFill {
        GroupFill::new("OCCUPATION_TYPE", "NAME_INCOME_TYPE")
    }

    #[test]
    fn test_fills_with_group_mode() {
        let mut df = df![
            "NAME_INCOME_TYPE" => ["Working", "Working", "Working", "Pensioner", "Pensioner", "Working"],
            "OCCUPATION_TYPE" => [Some("Laborers"), Some("Laborers"), Some("Drivers"), Some("Cleaning staff"), None, None],
        ]
        .unwrap();

        let record = GroupedModeImputer::apply(&mut df, &occupation_fill()).unwrap();

        assert_eq!(record.values_filled, 2);
        assert_eq!(record.values_remaining, 0);
        assert_eq!(
            values(&df, "OCCUPATION_TYPE"),
            vec![
                Some("Laborers".to_string()),
                Some("Laborers".to_string()),
                Some("Drivers".to_string()),
                Some("Cleaning staff".to_string()),
                Some("Cleaning staff".to_string()),
                Some("Laborers".to_string()),
            ]
        );
    }

    #[test]
    fn test_group_without_observed_values_left_as_is() {
        let mut df = df![
            "NAME_INCOME_TYPE" => ["Working", "Unemployed", "Unemployed"],
            "OCCUPATION_TYPE" => [Some("Laborers"), None, None],
        ]
        .unwrap();

        let record = GroupedModeImputer::apply(&mut df, &occupation_fill()).unwrap();

        assert_eq!(record.values_filled, 0);
        assert_eq!(record.values_remaining, 2);
        assert_eq!(df.column("OCCUPATION_TYPE").unwrap().null_count(), 2);
    }

    #[test]
    fn test_null_group_key_left_as_is() {
        let mut df = df![
            "NAME_INCOME_TYPE" => [Some("Working"), None],
            "OCCUPATION_TYPE" => [Some("Laborers"), None],
        ]
        .unwrap();

        let record = GroupedModeImputer::apply(&mut df, &occupation_fill()).unwrap();
        assert_eq!(record.values_filled, 0);
        assert_eq!(values(&df, "OCCUPATION_TYPE")[1], None);
    }

    #[test]
    fn test_tie_within_group_uses_first_seen() {
        let mut df = df![
            "NAME_FAMILY_STATUS" => ["Married", "Married", "Married"],
            "NAME_EDUCATION_TYPE" => [Some("Higher education"), Some("Secondary"), None],
        ]
        .unwrap();

        GroupedModeImputer::apply(
            &mut df,
            &GroupFill::new("NAME_EDUCATION_TYPE", "NAME_FAMILY_STATUS"),
        )
        .unwrap();

        assert_eq!(
            values(&df, "NAME_EDUCATION_TYPE")[2],
            Some("Higher education".to_string())
        );
    }

    #[test]
    fn test_missing_group_column() {
        let mut df = df!["OCCUPATION_TYPE" => [Some("Laborers"), None]].unwrap();
        let err = GroupedModeImputer::apply(&mut df, &occupation_fill()).unwrap_err();
        assert!(matches!(err, CleaningError::MissingColumn(ref c) if c == "NAME_INCOME_TYPE"));
    }

    #[test]
    fn test_column_order_preserved() {
        let mut df = df![
            "OCCUPATION_TYPE" => [Some("Laborers"), None],
            "NAME_INCOME_TYPE" => ["Working", "Working"],
        ]
        .unwrap();

        GroupedModeImputer::apply(&mut df, &occupation_fill()).unwrap();
        assert_eq!(df.get_column_names()[0].as_str(), "OCCUPATION_TYPE");
    }
}
