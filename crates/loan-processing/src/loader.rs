//! CSV input for the cleaning pipeline.
//!
//! Tables are read with a chain of increasingly permissive strategies so that
//! a late type change in a large file or a stray non-UTF-8 byte does not stop
//! a run.

use crate::error::{CleaningError, Result, ResultExt};
use polars::prelude::*;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// Rows sampled for schema inference on the first attempt.
pub const INFER_SCHEMA_ROWS: usize = 10_000;

const DESCRIPTION_NAME_COLUMN: &str = "Row";
const DESCRIPTION_TEXT_COLUMN: &str = "Description";

/// Load a CSV file with a header row.
///
/// Empty fields are read as nulls.
///
/// # Errors
///
/// [`CleaningError::FileNotFound`] if `path` does not exist; otherwise the
/// error of the last strategy tried.
pub fn load_csv(path: &Path) -> Result<DataFrame> {
    if !path.exists() {
        return Err(CleaningError::FileNotFound(path.to_path_buf()));
    }

    // Strategy 1: sampled schema inference
    match read_csv(path, Some(INFER_SCHEMA_ROWS), CsvEncoding::Utf8) {
        Ok(df) => return Ok(log_loaded(path, df)),
        Err(e) => debug!("Sampled schema inference failed for {}: {}", path.display(), e),
    }

    // Strategy 2: infer from every row
    match read_csv(path, None, CsvEncoding::Utf8) {
        Ok(df) => return Ok(log_loaded(path, df)),
        Err(e) => debug!("Full schema inference failed for {}: {}", path.display(), e),
    }

    // Strategy 3: tolerate invalid UTF-8
    warn!("Reading {} with lossy UTF-8 decoding", path.display());
    let df = read_csv(path, None, CsvEncoding::LossyUtf8)
        .context(format!("Failed to read {}", path.display()))?;
    Ok(log_loaded(path, df))
}

/// Load the column description file as `column name -> description`.
///
/// The file is latin-1 in the wild and is decoded lossily. A name listed for
/// several tables keeps its first description.
pub fn load_column_descriptions(path: &Path) -> Result<HashMap<String, String>> {
    if !path.exists() {
        return Err(CleaningError::FileNotFound(path.to_path_buf()));
    }

    let df = read_csv(path, Some(0), CsvEncoding::LossyUtf8)?;
    let names = df
        .column(DESCRIPTION_NAME_COLUMN)
        .map_err(|_| CleaningError::MissingColumn(DESCRIPTION_NAME_COLUMN.to_string()))?
        .cast(&DataType::String)?;
    let texts = df
        .column(DESCRIPTION_TEXT_COLUMN)
        .map_err(|_| CleaningError::MissingColumn(DESCRIPTION_TEXT_COLUMN.to_string()))?
        .cast(&DataType::String)?;

    let mut descriptions = HashMap::new();
    for (name, text) in names.str()?.into_iter().zip(texts.str()?) {
        if let (Some(name), Some(text)) = (name, text) {
            descriptions
                .entry(name.trim().to_string())
                .or_insert_with(|| text.trim().to_string());
        }
    }

    info!(
        "Loaded {} column descriptions from {}",
        descriptions.len(),
        path.display()
    );
    Ok(descriptions)
}

fn read_csv(path: &Path, infer_rows: Option<usize>, encoding: CsvEncoding) -> PolarsResult<DataFrame> {
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(infer_rows)
        .with_parse_options(
            CsvParseOptions::default()
                .with_quote_char(Some(b'"'))
                .with_encoding(encoding),
        )
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()
}

fn log_loaded(path: &Path, df: DataFrame) -> DataFrame {
    info!(
        "Loaded {}: {} rows x {} columns",
        path.display(),
        df.height(),
        df.width()
    );
    df
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_csv_missing_file() {
        let err = load_csv(Path::new("does/not/exist.csv")).unwrap_err();
        assert!(matches!(err, CleaningError::FileNotFound(_)));
        assert_eq!(err.error_code(), "FILE_NOT_FOUND");
    }

    #[test]
    fn test_load_csv_empty_fields_are_null() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.csv");
        fs::write(&path, "SK_ID_CURR,EXT_SOURCE_1,OCCUPATION_TYPE\n1,0.5,Laborers\n2,,\n").unwrap();

        let df = load_csv(&path).unwrap();
        assert_eq!(df.shape(), (2, 3));
        assert_eq!(df.column("EXT_SOURCE_1").unwrap().null_count(), 1);
        assert_eq!(df.column("OCCUPATION_TYPE").unwrap().null_count(), 1);
    }

    #[test]
    fn test_load_csv_late_type_change() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.csv");
        let mut content = String::from("AMT\n");
        for _ in 0..INFER_SCHEMA_ROWS + 5 {
            content.push_str("1\n");
        }
        content.push_str("2.5\n");
        fs::write(&path, content).unwrap();

        let df = load_csv(&path).unwrap();
        assert_eq!(df.height(), INFER_SCHEMA_ROWS + 6);
        assert_eq!(df.column("AMT").unwrap().dtype(), &DataType::Float64);
    }

    #[test]
    fn test_load_column_descriptions_latin1() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("columns_description.csv");

        let mut bytes = b",Table,Row,Description,Special\n".to_vec();
        bytes.extend_from_slice(b"1,application_data,OWN_CAR_AGE,Age of client's car,\n");
        bytes.extend_from_slice(b"2,application_data,EXT_SOURCE_1,Normalized score \xb0 external,normalized\n");
        bytes.extend_from_slice(b"3,previous_application.csv,OWN_CAR_AGE,Duplicate entry,\n");
        fs::write(&path, bytes).unwrap();

        let descriptions = load_column_descriptions(&path).unwrap();

        assert_eq!(descriptions.len(), 2);
        assert_eq!(descriptions["OWN_CAR_AGE"], "Age of client's car");
        assert!(descriptions["EXT_SOURCE_1"].starts_with("Normalized score"));
    }

    #[test]
    fn test_load_column_descriptions_without_expected_columns() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.csv");
        fs::write(&path, "a,b\n1,2\n").unwrap();

        let err = load_column_descriptions(&path).unwrap_err();
        assert!(matches!(err, CleaningError::MissingColumn(ref c) if c == "Row"));
    }
}
