//! Output module: cleaned CSV tables and the JSON run report.
//!
//! The same [`CleaningReport`] backs the `--json` stdout output, the
//! `--emit-report` file and programmatic access in library mode.
//!
//! # Example
//!
//! ```rust,ignore
//! use loan_processing::reporting::{ReportGenerator, TableReport};
//!
//! let generator = ReportGenerator::new("out");
//! let path = generator.write_table(&mut result.data, "cleaned_application_data.csv")?;
//!
//! let report = ReportGenerator::build_report(
//!     config.reference_date,
//!     vec![TableReport::from_result(&result, "application_data.csv", Some(&path))],
//! );
//! generator.write_report_to_file(&report, "cleaning")?;
//! ```

mod generator;

pub use generator::{CleaningReport, ReportGenerator, TableReport};
