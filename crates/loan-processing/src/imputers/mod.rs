//! Imputation module for handling missing values.
//!
//! This module provides:
//! - Statistical imputation (median, mode, blanket fallback)
//! - Group-conditional mode imputation

mod grouped;
mod statistical;

pub use grouped::GroupedModeImputer;
pub use statistical::StatisticalImputer;
