//! Calendar date reconstruction from day-offset columns.
//!
//! Offset columns count days relative to a fixed reference date (negative
//! values lie in the past). Offsets outside the validity window, including
//! the `365243` "not applicable" placeholder, never take part in date
//! arithmetic and become null in the reconstructed column.

use crate::config::{CleaningConfig, DateColumn, SENTINEL_OFFSET};
use crate::error::{CleaningError, Result};
use crate::types::DateReconstruction;
use chrono::{NaiveDate, TimeDelta};
use polars::prelude::*;
use tracing::debug;

const UNIX_EPOCH: NaiveDate = match NaiveDate::from_ymd_opt(1970, 1, 1) {
    Some(date) => date,
    None => panic!("invalid epoch"),
};

/// What a single offset cell turned into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Offset {
    Date(NaiveDate),
    OutOfWindow { sentinel: bool },
    Invalid,
}

/// Maps signed day offsets to calendar dates around a reference date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateReconstructor {
    reference_date: NaiveDate,
    window: i64,
}

impl DateReconstructor {
    pub fn new(reference_date: NaiveDate, window: i64) -> Self {
        Self {
            reference_date,
            window,
        }
    }

    pub fn from_config(config: &CleaningConfig) -> Self {
        Self::new(config.reference_date, config.offset_window)
    }

    pub fn reference_date(&self) -> NaiveDate {
        self.reference_date
    }

    pub fn window(&self) -> i64 {
        self.window
    }

    /// Whether `offset` lies inside `[-window, window]`.
    #[inline]
    pub fn in_window(&self, offset: i64) -> bool {
        (-self.window..=self.window).contains(&offset)
    }

    /// `reference_date + offset` days, or `None` outside the window.
    pub fn offset_to_date(&self, offset: i64) -> Option<NaiveDate> {
        if !self.in_window(offset) {
            return None;
        }
        self.reference_date
            .checked_add_signed(TimeDelta::try_days(offset)?)
    }

    /// Inverse of [`offset_to_date`](Self::offset_to_date).
    pub fn date_to_offset(&self, date: NaiveDate) -> i64 {
        (date - self.reference_date).num_days()
    }

    fn classify(&self, value: Option<f64>) -> Offset {
        let Some(value) = value else {
            return Offset::Invalid;
        };
        if !value.is_finite() || value.fract() != 0.0 {
            return Offset::Invalid;
        }

        let offset = value as i64;
        match self.offset_to_date(offset) {
            Some(date) => Offset::Date(date),
            None => Offset::OutOfWindow {
                sentinel: offset == SENTINEL_OFFSET,
            },
        }
    }

    /// Append (or replace) `column.target` as a `Date` column derived from
    /// the offsets in `column.source`.
    ///
    /// Missing, non-integral and out-of-window offsets become null.
    ///
    /// # Errors
    ///
    /// [`CleaningError::MissingColumn`] if the source column is absent; the
    /// table is left untouched in that case.
    pub fn reconstruct(
        &self,
        df: &mut DataFrame,
        column: &DateColumn,
    ) -> Result<DateReconstruction> {
        let source = df
            .column(&column.source)
            .map_err(|_| CleaningError::MissingColumn(column.source.clone()))?;

        let offsets = source.as_materialized_series().cast(&DataType::Float64)?;

        let mut stats = DateReconstruction {
            source: column.source.clone(),
            target: column.target.clone(),
            ..DateReconstruction::default()
        };

        let mut epoch_days: Vec<Option<i32>> = Vec::with_capacity(offsets.len());
        for value in offsets.f64()?.into_iter() {
            match self.classify(value) {
                Offset::Date(date) => {
                    stats.mapped += 1;
                    epoch_days.push(Some((date - UNIX_EPOCH).num_days() as i32));
                }
                Offset::OutOfWindow { sentinel } => {
                    stats.out_of_window += 1;
                    if sentinel {
                        stats.sentinel += 1;
                    }
                    epoch_days.push(None);
                }
                Offset::Invalid => {
                    stats.invalid += 1;
                    epoch_days.push(None);
                }
            }
        }

        let dates =
            Series::new(column.target.as_str().into(), epoch_days).cast(&DataType::Date)?;
        df.with_column(dates)?;

        debug!(
            "{} -> {}: {} mapped, {} out of window ({} sentinel), {} invalid",
            stats.source,
            stats.target,
            stats.mapped,
            stats.out_of_window,
            stats.sentinel,
            stats.invalid
        );

        Ok(stats)
    }
}
