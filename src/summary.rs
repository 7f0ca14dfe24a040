//! Descriptive statistics for cleaned tables.
//!
//! [`summarize`] produces a [`SummaryReport`] with three parts:
//!
//! - numeric columns (integer/float storage): mean, median, min, max and sample standard
//!   deviation over the non-missing values
//! - categorical columns (text storage): distinct count and the ten most frequent values
//! - missing-value counts for every column that has any
//!
//! Numeric statistics and value counts are computed with polars (see `frame`). Statistics that
//! are undefined for a column (no values, or fewer than two for the standard
//! deviation) are NaN rather than an error.

use indexmap::IndexMap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::cleaning::CleanedTable;
use crate::error::IngestionResult;
use crate::frame;
use crate::serde_helpers::finite_or_null;
use crate::types::{StorageType, Table, Value};

/// Number of values listed in [`CategoricalSummary::top_values`].
pub const TOP_VALUES_LIMIT: usize = 10;

/// Statistics for one numeric column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NumericSummary {
    #[serde(with = "finite_or_null")]
    pub mean: f64,
    #[serde(with = "finite_or_null")]
    pub median: f64,
    #[serde(with = "finite_or_null")]
    pub min: f64,
    #[serde(with = "finite_or_null")]
    pub max: f64,
    #[serde(with = "finite_or_null")]
    pub std: f64,
}

impl NumericSummary {
    /// All statistics NaN, as for a column without values.
    pub fn undefined() -> Self {
        Self {
            mean: f64::NAN,
            median: f64::NAN,
            min: f64::NAN,
            max: f64::NAN,
            std: f64::NAN,
        }
    }
}

/// Statistics for one text column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoricalSummary {
    /// Number of distinct non-missing values.
    pub unique_count: u64,
    /// Most frequent values, descending; ties keep first-appearance order.
    pub top_values: IndexMap<String, u64>,
}

/// The three-part summary of a table. Every part is keyed by column name in column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryReport {
    pub numeric_columns: IndexMap<String, NumericSummary>,
    pub categorical_columns: IndexMap<String, CategoricalSummary>,
    pub missing_values: IndexMap<String, u64>,
}

impl SummaryReport {
    pub fn numeric(&self, column: &str) -> Option<&NumericSummary> {
        self.numeric_columns.get(column)
    }

    pub fn categorical(&self, column: &str) -> Option<&CategoricalSummary> {
        self.categorical_columns.get(column)
    }

    /// Missing-value count for `column`; `0` when the column has none (or does not exist).
    pub fn missing(&self, column: &str) -> u64 {
        self.missing_values.get(column).copied().unwrap_or(0)
    }
}

enum ColumnStats {
    Numeric(NumericSummary),
    Categorical(CategoricalSummary),
    Other,
}

/// Summarize a cleaned table.
pub fn summarize(table: &CleanedTable) -> SummaryReport {
    summarize_table(table.table())
}

pub(crate) fn summarize_table(table: &Table) -> SummaryReport {
    let per_column: Vec<(String, ColumnStats, u64)> = table
        .schema
        .fields
        .par_iter()
        .enumerate()
        .map(|(idx, field)| {
            let missing = table.column(idx).filter(|v| v.is_missing()).count() as u64;
            let stats = match field.storage {
                StorageType::Int64 | StorageType::Float64 => {
                    let stats = numeric_summary(table.column(idx)).unwrap_or_else(|e| {
                        warn!(column = %field.name, error = %e, "numeric summary failed");
                        NumericSummary::undefined()
                    });
                    ColumnStats::Numeric(stats)
                }
                StorageType::Utf8 => {
                    let stats = categorical_summary(table.column(idx)).unwrap_or_else(|e| {
                        warn!(column = %field.name, error = %e, "categorical summary failed");
                        CategoricalSummary::default()
                    });
                    ColumnStats::Categorical(stats)
                }
                StorageType::Bool | StorageType::Datetime => ColumnStats::Other,
            };
            (field.name.clone(), stats, missing)
        })
        .collect();

    let mut report = SummaryReport {
        numeric_columns: IndexMap::new(),
        categorical_columns: IndexMap::new(),
        missing_values: IndexMap::new(),
    };
    for (name, stats, missing) in per_column {
        if missing > 0 {
            report.missing_values.insert(name.clone(), missing);
        }
        match stats {
            ColumnStats::Numeric(s) => {
                report.numeric_columns.insert(name, s);
            }
            ColumnStats::Categorical(s) => {
                report.categorical_columns.insert(name, s);
            }
            ColumnStats::Other => {}
        }
    }
    report
}

/// Numeric statistics over the non-missing values of a column.
pub fn numeric_summary<'a>(
    values: impl Iterator<Item = &'a Value>,
) -> IngestionResult<NumericSummary> {
    Ok(frame::describe(values)?)
}

/// Distinct count and top values of a text column.
pub fn categorical_summary<'a>(
    values: impl Iterator<Item = &'a Value>,
) -> IngestionResult<CategoricalSummary> {
    let counts = value_counts(values)?;
    Ok(CategoricalSummary {
        unique_count: counts.len() as u64,
        top_values: counts.into_iter().take(TOP_VALUES_LIMIT).collect(),
    })
}

/// Count non-missing values by their display string.
///
/// Sorted by count descending; equal counts keep the order in which values first appeared.
pub fn value_counts<'a>(
    values: impl Iterator<Item = &'a Value>,
) -> IngestionResult<Vec<(String, u64)>> {
    let mut counts = frame::count_by_key(values)?;
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    Ok(counts)
}
