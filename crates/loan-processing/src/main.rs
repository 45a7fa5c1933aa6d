//! CLI entry point for the loan-application cleaning pipeline.

use anyhow::{Result, anyhow};
use chrono::NaiveDate;
use clap::Parser;
use loan_processing::config::CleaningConfigBuilder;
use loan_processing::utils::has_column;
use loan_processing::{
    CleaningConfig, CleaningError, CleaningPipeline, CleaningReport, CleaningResult,
    MissingValueReducer, OutlierHandler, ReportGenerator, TableReport, load_column_descriptions,
    load_csv,
};
use polars::prelude::*;
use serde_json::json;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

const DEFAULT_DESCRIPTIONS_FILE: &str = "columns_description.csv";
const REPORT_BASE_NAME: &str = "cleaning";

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Loan application data cleaning pipeline",
    long_about = "Cleans the application and previous-application tables of a loan dataset:\n\
                  drops mostly-empty columns, imputes missing values, removes IQR outliers\n\
                  and reconstructs calendar dates from day offsets.\n\n\
                  EXAMPLES:\n  \
                  # Clean the files in the current directory\n  \
                  loan-processing\n\n  \
                  # Explicit inputs and output directory\n  \
                  loan-processing --application data/app.csv --previous data/prev.csv -o out/\n\n  \
                  # Preview without writing anything\n  \
                  loan-processing --dry-run\n\n  \
                  # Machine-readable summary\n  \
                  loan-processing --json | jq '.tables[0].summary.dropped_columns'"
)]
struct Args {
    /// Application table (one row per applicant)
    #[arg(long, default_value = "application_data.csv")]
    application: PathBuf,

    /// Previous-application table (one row per historical loan)
    #[arg(long, default_value = "previous_application.csv")]
    previous: PathBuf,

    /// Column description file used to annotate dropped columns
    ///
    /// Defaults to columns_description.csv when that file exists
    #[arg(long)]
    descriptions: Option<PathBuf>,

    /// Output directory for cleaned tables and reports
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// JSON configuration file; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Missing column threshold (0.0 - 1.0)
    ///
    /// Application columns with a missing fraction above this are dropped
    #[arg(long)]
    missing_col_threshold: Option<f64>,

    /// Width of the IQR outlier fence
    #[arg(long)]
    iqr_multiplier: Option<f64>,

    /// Reference date that day offsets count from (YYYY-MM-DD)
    #[arg(long)]
    reference_date: Option<NaiveDate>,

    /// Day offsets beyond +/- this many days become missing dates
    #[arg(long)]
    offset_window: Option<i64>,

    /// Preview what the pipeline will do without writing anything
    #[arg(long)]
    dry_run: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Suppress progress output (only show warnings, errors and the final result)
    #[arg(short, long)]
    quiet: bool,

    /// Output JSON to stdout instead of human-readable summary
    ///
    /// Disables all progress logs; only outputs the final JSON report.
    #[arg(long)]
    json: bool,

    /// Write a detailed JSON report to the output directory
    ///
    /// The report will be saved as cleaning_report.json
    #[arg(short = 'r', long)]
    emit_report: bool,

    /// Clean the two tables one after another instead of concurrently
    #[arg(long)]
    sequential: bool,
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is completely disabled to ensure
/// only JSON is written to stdout.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level, args.quiet, args.json);

    match run(&args) {
        Ok(()) => Ok(()),
        Err(e) => {
            if args.json {
                print_json_error(&e)?;
            } else {
                error!("{:#}", e);
            }
            Err(e)
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let config = build_config(args)?;
    debug!("Effective configuration: {:?}", config);

    let descriptions = load_descriptions(args)?;

    info!("Loading application data from: {}", args.application.display());
    let application = load_csv(&args.application)?;
    info!("Loading previous applications from: {}", args.previous.display());
    let previous = load_csv(&args.previous)?;

    if args.dry_run {
        return run_dry_run(args, &config, &application, &previous);
    }

    let pipeline = build_pipeline(args, config, descriptions)?;
    run_pipeline(&pipeline, args, application, previous)
}

/// Defaults, then the config file, then individual flags.
fn build_config(args: &Args) -> Result<CleaningConfig> {
    let base = match &args.config {
        Some(path) => {
            if !path.exists() {
                return Err(CleaningError::FileNotFound(path.clone()).into());
            }
            info!("Loading configuration from: {}", path.display());
            CleaningConfig::from_json(&std::fs::read_to_string(path)?)?
        }
        None => CleaningConfig::default(),
    };

    let mut builder = CleaningConfigBuilder::from_config(base);
    if let Some(threshold) = args.missing_col_threshold {
        builder = builder.missing_column_threshold(threshold);
    }
    if let Some(multiplier) = args.iqr_multiplier {
        builder = builder.iqr_multiplier(multiplier);
    }
    if let Some(date) = args.reference_date {
        builder = builder.reference_date(date);
    }
    if let Some(window) = args.offset_window {
        builder = builder.offset_window(window);
    }

    builder
        .build()
        .map_err(|e| CleaningError::InvalidConfig(e.to_string()).into())
}

/// An explicitly given description file must exist; the default one is
/// optional.
fn load_descriptions(args: &Args) -> Result<HashMap<String, String>> {
    if let Some(path) = &args.descriptions {
        return Ok(load_column_descriptions(path)?);
    }

    let default_path = Path::new(DEFAULT_DESCRIPTIONS_FILE);
    if !default_path.exists() {
        debug!("No {} found, dropped columns stay unannotated", DEFAULT_DESCRIPTIONS_FILE);
        return Ok(HashMap::new());
    }

    match load_column_descriptions(default_path) {
        Ok(descriptions) => Ok(descriptions),
        Err(e) => {
            warn!("Ignoring {}: {}", DEFAULT_DESCRIPTIONS_FILE, e);
            Ok(HashMap::new())
        }
    }
}

fn build_pipeline(
    args: &Args,
    config: CleaningConfig,
    descriptions: HashMap<String, String>,
) -> Result<CleaningPipeline> {
    let mut builder = CleaningPipeline::builder()
        .config(config)
        .column_descriptions(descriptions);

    if !args.quiet && !args.json {
        builder = builder.on_progress(|update| {
            if update.column.is_some() {
                debug!(
                    "[{}] [{:.0}%] {}: {}",
                    update.table,
                    update.progress * 100.0,
                    update.stage.display_name(),
                    update.message
                );
            } else {
                info!(
                    "[{}] [{:.0}%] {}: {}",
                    update.table,
                    update.progress * 100.0,
                    update.stage.display_name(),
                    update.message
                );
            }
        });
    }

    Ok(builder.build()?)
}

/// Run dry-run mode - show what would happen without processing
///
/// Note: This function uses `println!` intentionally for user-facing CLI output.
/// It should always be visible regardless of log level settings.
fn run_dry_run(
    args: &Args,
    config: &CleaningConfig,
    application: &DataFrame,
    previous: &DataFrame,
) -> Result<()> {
    println!("\n{}", "=".repeat(80));
    println!("DRY RUN - Preview of cleaning actions");
    println!("{}\n", "=".repeat(80));

    println!("INPUT FILES");
    println!("{}", "-".repeat(40));
    for (path, df) in [(&args.application, application), (&args.previous, previous)] {
        println!(
            "  {} ({} rows x {} columns)",
            path.display(),
            df.height(),
            df.width()
        );
    }
    println!();

    println!("MISSING VALUES (application)");
    println!("{}", "-".repeat(40));
    let to_drop: Vec<(String, f64)> = MissingValueReducer::missing_fractions(application)
        .into_iter()
        .filter(|(_, fraction)| *fraction > config.missing_column_threshold)
        .collect();
    if to_drop.is_empty() {
        println!(
            "  No columns exceed {:.0}% missing threshold",
            config.missing_column_threshold * 100.0
        );
    } else {
        println!(
            "  Will drop {} columns with >{:.0}% missing:",
            to_drop.len(),
            config.missing_column_threshold * 100.0
        );
        for (name, fraction) in &to_drop {
            println!("    {:<32} {:>6.1}%", truncate_str(name, 31), fraction * 100.0);
        }
    }
    println!();

    println!("OUTLIER BOUNDS (application, before filtering)");
    println!("{}", "-".repeat(40));
    println!("{:<24} {:>14} {:>14}", "Column", "Lower", "Upper");
    println!("{}", "-".repeat(54));
    for col_name in &config.outlier_columns {
        match OutlierHandler::column_bounds(application, col_name, config.iqr_multiplier)? {
            Some(bounds) => println!(
                "{:<24} {:>14.2} {:>14.2}",
                truncate_str(col_name, 23),
                bounds.lower,
                bounds.upper
            ),
            None => println!("{:<24} {:>14}", truncate_str(col_name, 23), "skipped"),
        }
    }
    println!("  Later bounds are computed on rows kept by earlier filters.");
    println!();

    println!(
        "DATE COLUMNS (reference {}, window +/-{} days)",
        config.reference_date, config.offset_window
    );
    println!("{}", "-".repeat(40));
    for (df, columns) in [
        (application, &config.application_dates),
        (previous, &config.previous_dates),
    ] {
        for column in columns {
            let status = if has_column(df, &column.source) {
                "found"
            } else {
                "missing, skipped"
            };
            println!("  {} -> {} ({})", column.source, column.target, status);
        }
    }
    println!();

    println!("OUTPUT FILES (will be created)");
    println!("{}", "-".repeat(40));
    let generator = ReportGenerator::new(&args.output);
    println!("  - {}", generator.output_path(&config.application_output).display());
    println!("  - {}", generator.output_path(&config.previous_output).display());
    if args.emit_report {
        println!(
            "  - {}",
            generator
                .output_path(&format!("{}_report.json", REPORT_BASE_NAME))
                .display()
        );
    }
    println!();

    println!("{}", "=".repeat(80));
    println!("To execute this cleaning, run without --dry-run");
    if !args.emit_report {
        println!("Add --emit-report to save a detailed JSON report");
    }
    println!("{}", "=".repeat(80));

    Ok(())
}

/// Truncate a string to max length with ellipsis
fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

/// Clean both tables, write them out and print results.
fn run_pipeline(
    pipeline: &CleaningPipeline,
    args: &Args,
    application: DataFrame,
    previous: DataFrame,
) -> Result<()> {
    info!("{}", "=".repeat(80));
    info!("Starting cleaning pipeline...");
    info!("{}", "=".repeat(80));

    let original_shapes = [application.shape(), previous.shape()];

    let (mut application, mut previous) = if args.sequential {
        (
            pipeline.clean_application(application)?,
            pipeline.clean_previous_application(previous)?,
        )
    } else {
        std::thread::scope(|s| -> Result<(CleaningResult, CleaningResult)> {
            let app = s.spawn(|| pipeline.clean_application(application));
            let prev = pipeline.clean_previous_application(previous);
            let app = app
                .join()
                .map_err(|_| anyhow!("Application cleaning thread panicked"))?;
            Ok((app?, prev?))
        })?
    };

    let config = pipeline.config();
    let generator = ReportGenerator::new(&args.output);
    let application_path = generator.write_table(&mut application.data, &config.application_output)?;
    let previous_path = generator.write_table(&mut previous.data, &config.previous_output)?;

    let report = ReportGenerator::build_report(
        config.reference_date,
        vec![
            TableReport::from_result(
                &application,
                args.application.display().to_string(),
                Some(&application_path),
            ),
            TableReport::from_result(
                &previous,
                args.previous.display().to_string(),
                Some(&previous_path),
            ),
        ],
    );

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if args.emit_report {
        let report_path = generator.write_report_to_file(&report, REPORT_BASE_NAME)?;
        info!("Report written to: {}", report_path.display());
    }

    print_human_readable_summary(&report, original_shapes);

    Ok(())
}

/// Print an error as JSON on stdout, keeping `--json` output parseable.
fn print_json_error(err: &anyhow::Error) -> Result<()> {
    let error = match err.downcast_ref::<CleaningError>() {
        Some(cleaning_error) => serde_json::to_value(cleaning_error)?,
        None => json!({ "code": "ERROR", "message": format!("{:#}", err) }),
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({ "success": false, "error": error }))?
    );
    Ok(())
}

/// Print a human-readable summary of the cleaning results.
fn print_human_readable_summary(report: &CleaningReport, original_shapes: [(usize, usize); 2]) {
    println!();
    println!("{}", "=".repeat(80));
    println!("CLEANING COMPLETE");
    println!("{}", "=".repeat(80));

    for (table, original_shape) in report.tables.iter().zip(original_shapes) {
        let summary = &table.summary;

        println!();
        println!("{}", table.table.display_name().to_uppercase());
        println!("{}", "-".repeat(40));
        println!(
            "Input:  {} ({} rows x {} columns)",
            table.input_file, original_shape.0, original_shape.1
        );
        if let Some(ref output_file) = table.output_file {
            println!(
                "Output: {} ({} rows x {} columns)",
                output_file, table.final_shape.0, table.final_shape.1
            );
        }
        println!("  Duration: {}ms", summary.duration_ms);
        println!(
            "  Rows: {} -> {} ({} removed, {:.1}%)",
            summary.rows_before,
            summary.rows_after,
            summary.rows_removed(),
            table.rows_removed_percent
        );

        if !summary.dropped_columns.is_empty() {
            println!("  Dropped columns:");
            for column in &summary.dropped_columns {
                match &column.description {
                    Some(description) => println!(
                        "    - {} ({:.1}% missing): {}",
                        column.name,
                        column.missing_fraction * 100.0,
                        description
                    ),
                    None => println!(
                        "    - {} ({:.1}% missing)",
                        column.name,
                        column.missing_fraction * 100.0
                    ),
                }
            }
        }

        let filled: Vec<_> = summary
            .imputations
            .iter()
            .filter(|r| r.values_filled > 0)
            .collect();
        if !filled.is_empty() {
            println!("  Imputed ({} values):", summary.total_imputed());
            for record in filled.iter().take(10) {
                println!(
                    "    - {}: {} by {}",
                    record.column, record.values_filled, record.method
                );
            }
            if filled.len() > 10 {
                println!("    ... and {} more columns", filled.len() - 10);
            }
        }

        if !summary.outliers_removed.is_empty() {
            println!("  Outliers removed:");
            for removal in &summary.outliers_removed {
                println!(
                    "    - {}: {} rows outside [{:.2}, {:.2}]",
                    removal.column, removal.rows_removed, removal.lower_bound, removal.upper_bound
                );
            }
        }

        if !summary.reconstructed_dates.is_empty() {
            println!("  Dates:");
            for dates in &summary.reconstructed_dates {
                println!(
                    "    - {}: {} dates, {} missing ({} placeholder)",
                    dates.target,
                    dates.mapped,
                    dates.missing(),
                    dates.sentinel
                );
            }
        }

        if !summary.warnings.is_empty() {
            println!("  Warnings:");
            for warning in &summary.warnings {
                println!("    ! {}", warning);
            }
        }
    }

    println!();
    println!("Use --json for machine-readable output");
    println!("Use --emit-report to save detailed JSON report");
    println!("{}", "=".repeat(80));
}
