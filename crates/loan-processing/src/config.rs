//! Configuration types for the cleaning pipeline.
//!
//! The defaults reproduce the fixed constants of the loan dataset cleaning
//! job. Everything can be overridden through [`CleaningConfig::builder()`] or
//! by deserializing a (partial) JSON document.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Reference date used as the zero point of all day-offset columns.
pub const DEFAULT_REFERENCE_DATE: NaiveDate = match NaiveDate::from_ymd_opt(2025, 8, 3) {
    Some(date) => date,
    None => panic!("invalid default reference date"),
};

/// Offsets outside `[-window, window]` are treated as not applicable.
pub const DEFAULT_OFFSET_WINDOW: i64 = 30_000;

/// Placeholder the source system writes for "no real offset".
pub const SENTINEL_OFFSET: i64 = 365_243;

pub const DEFAULT_MISSING_COLUMN_THRESHOLD: f64 = 0.4;
pub const DEFAULT_IQR_MULTIPLIER: f64 = 1.5;

pub const DEFAULT_APPLICATION_OUTPUT: &str = "cleaned_application_data.csv";
pub const DEFAULT_PREVIOUS_OUTPUT: &str = "cleaned_previous_application.csv";

/// A categorical column imputed with the mode of a related grouping column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupFill {
    /// Column whose missing values are filled.
    pub target: String,
    /// Column that defines the groups.
    pub group_by: String,
}

impl GroupFill {
    pub fn new(target: impl Into<String>, group_by: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            group_by: group_by.into(),
        }
    }
}

/// A day-offset column and the calendar-date column derived from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateColumn {
    /// Day-offset column relative to the reference date.
    pub source: String,
    /// Name of the appended date column.
    pub target: String,
}

impl DateColumn {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }

    /// Derive the target name by appending `_ACTUAL` to the source.
    pub fn actual(source: impl Into<String>) -> Self {
        let source = source.into();
        let target = format!("{}_ACTUAL", source);
        Self { source, target }
    }
}

fn strings(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn default_median_columns() -> Vec<String> {
    strings(&["EXT_SOURCE_1", "EXT_SOURCE_2", "EXT_SOURCE_3"])
}

fn default_group_fills() -> Vec<GroupFill> {
    vec![
        GroupFill::new("OCCUPATION_TYPE", "NAME_INCOME_TYPE"),
        GroupFill::new("NAME_EDUCATION_TYPE", "NAME_FAMILY_STATUS"),
    ]
}

fn default_outlier_columns() -> Vec<String> {
    strings(&["AMT_INCOME_TOTAL", "AMT_CREDIT", "AMT_ANNUITY", "CNT_CHILDREN"])
}

fn default_application_dates() -> Vec<DateColumn> {
    vec![
        DateColumn::new("DAYS_BIRTH", "BIRTH_DATE"),
        DateColumn::new("DAYS_EMPLOYED", "EMPLOYMENT_START_DATE"),
    ]
}

fn default_previous_dates() -> Vec<DateColumn> {
    [
        "DAYS_FIRST_DRAWING",
        "DAYS_FIRST_DUE",
        "DAYS_LAST_DUE_1ST_VERSION",
        "DAYS_LAST_DUE",
        "DAYS_TERMINATION",
        "DAYS_DECISION",
    ]
    .into_iter()
    .map(DateColumn::actual)
    .collect()
}

/// Configuration for the cleaning pipeline.
///
/// Use [`CleaningConfig::builder()`] to create a new configuration
/// with fluent API.
///
/// # Example
///
/// ```rust,ignore
/// use loan_processing::config::CleaningConfig;
///
/// let config = CleaningConfig::builder()
///     .missing_column_threshold(0.5)
///     .iqr_multiplier(3.0)
///     .build()?;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CleaningConfig {
    /// Columns whose missing fraction is strictly above this are dropped
    /// from the application table (0.0 - 1.0).
    /// Default: 0.4
    pub missing_column_threshold: f64,

    /// Numeric application columns filled with their own median.
    pub median_columns: Vec<String>,

    /// Categorical application columns filled with a per-group mode.
    pub group_fills: Vec<GroupFill>,

    /// Application columns filtered by the IQR rule, in application order.
    pub outlier_columns: Vec<String>,

    /// Width of the IQR fence.
    /// Default: 1.5
    pub iqr_multiplier: f64,

    /// Zero point of all day-offset columns.
    /// Default: 2025-08-03
    pub reference_date: NaiveDate,

    /// Validity window for day offsets, in days.
    /// Default: 30000
    pub offset_window: i64,

    /// Date columns reconstructed in the application table.
    pub application_dates: Vec<DateColumn>,

    /// Date columns reconstructed in the previous-application table.
    pub previous_dates: Vec<DateColumn>,

    /// File name of the cleaned application table.
    pub application_output: String,

    /// File name of the cleaned previous-application table.
    pub previous_output: String,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            missing_column_threshold: DEFAULT_MISSING_COLUMN_THRESHOLD,
            median_columns: default_median_columns(),
            group_fills: default_group_fills(),
            outlier_columns: default_outlier_columns(),
            iqr_multiplier: DEFAULT_IQR_MULTIPLIER,
            reference_date: DEFAULT_REFERENCE_DATE,
            offset_window: DEFAULT_OFFSET_WINDOW,
            application_dates: default_application_dates(),
            previous_dates: default_previous_dates(),
            application_output: DEFAULT_APPLICATION_OUTPUT.to_string(),
            previous_output: DEFAULT_PREVIOUS_OUTPUT.to_string(),
        }
    }
}

impl CleaningConfig {
    /// Create a new configuration builder.
    pub fn builder() -> CleaningConfigBuilder {
        CleaningConfigBuilder::default()
    }

    /// Parse a JSON document; missing fields keep their defaults.
    pub fn from_json(json: &str) -> crate::error::Result<Self> {
        let config: CleaningConfig = serde_json::from_str(json)?;
        config
            .validate()
            .map_err(|e| crate::error::CleaningError::InvalidConfig(e.to_string()))?;
        Ok(config)
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if !(0.0..=1.0).contains(&self.missing_column_threshold) {
            return Err(ConfigValidationError::InvalidThreshold {
                field: "missing_column_threshold".to_string(),
                value: self.missing_column_threshold,
            });
        }

        if !self.iqr_multiplier.is_finite() || self.iqr_multiplier < 0.0 {
            return Err(ConfigValidationError::InvalidMultiplier(self.iqr_multiplier));
        }

        if self.offset_window <= 0 {
            return Err(ConfigValidationError::InvalidWindow(self.offset_window));
        }

        if let Some(fill) = self.group_fills.iter().find(|f| f.target == f.group_by) {
            return Err(ConfigValidationError::SelfGroupedFill(fill.target.clone()));
        }

        for file in [&self.application_output, &self.previous_output] {
            if file.trim().is_empty() {
                return Err(ConfigValidationError::EmptyOutputName);
            }
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid threshold for '{field}': {value} (must be between 0.0 and 1.0)")]
    InvalidThreshold { field: String, value: f64 },

    #[error("Invalid IQR multiplier: {0} (must be finite and non-negative)")]
    InvalidMultiplier(f64),

    #[error("Invalid offset window: {0} (must be at least 1 day)")]
    InvalidWindow(i64),

    #[error("Column '{0}' cannot be grouped by itself")]
    SelfGroupedFill(String),

    #[error("Output file names must not be empty")]
    EmptyOutputName,
}

/// Builder for [`CleaningConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct CleaningConfigBuilder {
    base: Option<CleaningConfig>,
    missing_column_threshold: Option<f64>,
    median_columns: Option<Vec<String>>,
    group_fills: Option<Vec<GroupFill>>,
    outlier_columns: Option<Vec<String>>,
    iqr_multiplier: Option<f64>,
    reference_date: Option<NaiveDate>,
    offset_window: Option<i64>,
    application_dates: Option<Vec<DateColumn>>,
    previous_dates: Option<Vec<DateColumn>>,
    application_output: Option<String>,
    previous_output: Option<String>,
}

impl CleaningConfigBuilder {
    /// Start from an existing configuration instead of the defaults.
    ///
    /// Used by the CLI to layer flag overrides on top of a config file.
    pub fn from_config(config: CleaningConfig) -> Self {
        Self {
            base: Some(config),
            ..Self::default()
        }
    }

    /// Set the threshold for dropping columns with missing values.
    ///
    /// # Arguments
    /// * `threshold` - Value between 0.0 and 1.0 (e.g., 0.4 = 40%)
    pub fn missing_column_threshold(mut self, threshold: f64) -> Self {
        self.missing_column_threshold = Some(threshold);
        self
    }

    pub fn median_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.median_columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn group_fills(mut self, fills: Vec<GroupFill>) -> Self {
        self.group_fills = Some(fills);
        self
    }

    pub fn outlier_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.outlier_columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Set the IQR fence multiplier.
    pub fn iqr_multiplier(mut self, multiplier: f64) -> Self {
        self.iqr_multiplier = Some(multiplier);
        self
    }

    /// Set the reference date that day offsets count from.
    pub fn reference_date(mut self, date: NaiveDate) -> Self {
        self.reference_date = Some(date);
        self
    }

    /// Set the validity window for day offsets.
    pub fn offset_window(mut self, days: i64) -> Self {
        self.offset_window = Some(days);
        self
    }

    pub fn application_dates(mut self, columns: Vec<DateColumn>) -> Self {
        self.application_dates = Some(columns);
        self
    }

    pub fn previous_dates(mut self, columns: Vec<DateColumn>) -> Self {
        self.previous_dates = Some(columns);
        self
    }

    pub fn application_output(mut self, name: impl Into<String>) -> Self {
        self.application_output = Some(name.into());
        self
    }

    pub fn previous_output(mut self, name: impl Into<String>) -> Self {
        self.previous_output = Some(name.into());
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `CleaningConfig` or an error if validation fails.
    pub fn build(self) -> Result<CleaningConfig, ConfigValidationError> {
        let base = self.base.unwrap_or_default();
        let config = CleaningConfig {
            missing_column_threshold: self
                .missing_column_threshold
                .unwrap_or(base.missing_column_threshold),
            median_columns: self.median_columns.unwrap_or(base.median_columns),
            group_fills: self.group_fills.unwrap_or(base.group_fills),
            outlier_columns: self.outlier_columns.unwrap_or(base.outlier_columns),
            iqr_multiplier: self.iqr_multiplier.unwrap_or(base.iqr_multiplier),
            reference_date: self.reference_date.unwrap_or(base.reference_date),
            offset_window: self.offset_window.unwrap_or(base.offset_window),
            application_dates: self.application_dates.unwrap_or(base.application_dates),
            previous_dates: self.previous_dates.unwrap_or(base.previous_dates),
            application_output: self.application_output.unwrap_or(base.application_output),
            previous_output: self.previous_output.unwrap_or(base.previous_output),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CleaningConfig::default();
        assert_eq!(config.missing_column_threshold, 0.4);
        assert_eq!(config.iqr_multiplier, 1.5);
        assert_eq!(config.offset_window, 30_000);
        assert_eq!(config.reference_date.to_string(), "2025-08-03");
        assert_eq!(config.outlier_columns.len(), 4);
        assert_eq!(config.group_fills[0].target, "OCCUPATION_TYPE");
        assert_eq!(config.group_fills[0].group_by, "NAME_INCOME_TYPE");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_previous_dates_get_actual_suffix() {
        let config = CleaningConfig::default();
        assert_eq!(config.previous_dates.len(), 6);
        assert!(
            config
                .previous_dates
                .iter()
                .all(|c| c.target == format!("{}_ACTUAL", c.source))
        );
    }

    #[test]
    fn test_builder_custom_values() {
        let config = CleaningConfig::builder()
            .missing_column_threshold(0.5)
            .iqr_multiplier(3.0)
            .offset_window(100)
            .outlier_columns(["AMT_CREDIT"])
            .application_dates(vec![DateColumn::new("DAYS_BIRTH", "BIRTH_DATE")])
            .previous_dates(vec![DateColumn::actual("DAYS_DECISION")])
            .application_output("app.csv")
            .previous_output("prev.csv")
            .build()
            .unwrap();

        assert_eq!(config.missing_column_threshold, 0.5);
        assert_eq!(config.application_dates.len(), 1);
        assert_eq!(config.previous_dates[0].target, "DAYS_DECISION_ACTUAL");
        assert_eq!(config.application_output, "app.csv");
        assert_eq!(config.previous_output, "prev.csv");
        assert_eq!(config.iqr_multiplier, 3.0);
        assert_eq!(config.offset_window, 100);
        assert_eq!(config.outlier_columns, vec!["AMT_CREDIT".to_string()]);
        // untouched fields keep defaults
        assert_eq!(config.median_columns.len(), 3);
    }

    #[test]
    fn test_builder_from_config_layers_overrides() {
        let base = CleaningConfig::builder()
            .iqr_multiplier(2.0)
            .build()
            .unwrap();
        let config = CleaningConfigBuilder::from_config(base)
            .missing_column_threshold(0.1)
            .build()
            .unwrap();

        assert_eq!(config.iqr_multiplier, 2.0);
        assert_eq!(config.missing_column_threshold, 0.1);
    }

    #[test]
    fn test_validation_invalid_threshold() {
        let result = CleaningConfig::builder()
            .missing_column_threshold(1.5)
            .build();

        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvalidThreshold { .. }
        ));
    }

    #[test]
    fn test_validation_invalid_multiplier() {
        let result = CleaningConfig::builder().iqr_multiplier(-1.0).build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvalidMultiplier(_)
        ));
    }

    #[test]
    fn test_validation_invalid_window() {
        let result = CleaningConfig::builder().offset_window(0).build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvalidWindow(0)
        ));
    }

    #[test]
    fn test_validation_self_grouped_fill() {
        let result = CleaningConfig::builder()
            .group_fills(vec![GroupFill::new("A", "A")])
            .build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::SelfGroupedFill(_)
        ));
    }

    #[test]
    fn test_validation_empty_output_name() {
        let result = CleaningConfig::builder().previous_output("  ").build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::EmptyOutputName
        ));
    }

    #[test]
    fn test_config_serialization_round_trip() {
        let config = CleaningConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: CleaningConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(config.reference_date, deserialized.reference_date);
        assert_eq!(config.group_fills, deserialized.group_fills);
        assert_eq!(config.previous_dates, deserialized.previous_dates);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let json = r#"{
            "missing_column_threshold": 0.25,
            "reference_date": "2020-01-01",
            "outlier_columns": ["AMT_CREDIT"]
        }"#;

        let config = CleaningConfig::from_json(json).expect("partial config should parse");

        assert_eq!(config.missing_column_threshold, 0.25);
        assert_eq!(config.reference_date.to_string(), "2020-01-01");
        assert_eq!(config.outlier_columns, vec!["AMT_CREDIT".to_string()]);
        assert_eq!(config.offset_window, DEFAULT_OFFSET_WINDOW);
        assert_eq!(config.application_output, DEFAULT_APPLICATION_OUTPUT);
    }

    #[test]
    fn test_invalid_json_config_rejected() {
        let json = r#"{ "offset_window": -5 }"#;
        let err = CleaningConfig::from_json(json).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CONFIG");
    }
}
