//! Columnar aggregation over table columns.
//!
//! Columns are copied into polars series only for the aggregations that summaries and charts
//! need. Missing cells (null or NaN) become polars nulls, so every aggregate skips them.
//! Grouping uses `group_by_stable`, which keeps groups in first-appearance order; callers rely on
//! that order to break ties after their own sort.

use polars::prelude::*;

use crate::summary::NumericSummary;
use crate::types::{StorageType, Value};

const KEY: &str = "key";
const VALUE: &str = "value";
const COUNT: &str = "count";
const TOTAL: &str = "total";

fn present(v: &Value) -> Option<&Value> {
    (!v.is_missing()).then_some(v)
}

/// A numeric column as a Float64 series; missing or non-numeric cells are null.
pub(crate) fn float_series<'a>(name: &str, values: impl Iterator<Item = &'a Value>) -> Series {
    let data: Vec<Option<f64>> = values.map(|v| present(v).and_then(Value::as_f64)).collect();
    Series::new(name.into(), data)
}

fn int_series<'a>(name: &str, values: impl Iterator<Item = &'a Value>) -> Series {
    let data: Vec<Option<i64>> = values
        .map(|v| match v {
            Value::Int64(n) => Some(*n),
            _ => None,
        })
        .collect();
    Series::new(name.into(), data)
}

/// Mean, median, min, max and sample standard deviation of the non-missing values.
pub(crate) fn describe<'a>(
    values: impl Iterator<Item = &'a Value>,
) -> PolarsResult<NumericSummary> {
    let series = float_series(VALUE, values);
    let ca = series.f64()?;
    let non_null = ca.len() - ca.null_count();
    Ok(NumericSummary {
        mean: ca.mean().unwrap_or(f64::NAN),
        median: ca.median().unwrap_or(f64::NAN),
        min: ca.min().unwrap_or(f64::NAN),
        max: ca.max().unwrap_or(f64::NAN),
        std: if non_null < 2 {
            f64::NAN
        } else {
            ca.std(1).unwrap_or(f64::NAN)
        },
    })
}

/// Occurrences of each non-missing value, keyed by display string, in first-appearance order.
pub(crate) fn count_by_key<'a>(
    values: impl Iterator<Item = &'a Value>,
) -> PolarsResult<Vec<(String, u64)>> {
    let keys: Vec<String> = values.filter_map(present).map(Value::to_string).collect();
    let df = DataFrame::new_infer_height(vec![Series::new(KEY.into(), keys).into()])?;
    let out = df
        .lazy()
        .group_by_stable([col(KEY)])
        .agg([len().cast(DataType::UInt64).alias(COUNT)])
        .collect()?;

    let keys = out.column(KEY)?.str()?;
    let counts = out.column(COUNT)?.u64()?;
    Ok(keys
        .into_iter()
        .zip(counts)
        .filter_map(|(k, n)| Some((k?.to_string(), n?)))
        .collect())
}

/// Per-category sum of a numeric value column, in first-appearance order of the categories.
///
/// Rows with a missing category are dropped. Missing values add nothing, so a category whose
/// values are all missing sums to zero. Integer columns sum as Int64.
pub(crate) fn sum_by_key<'a>(
    pairs: impl Iterator<Item = (&'a Value, &'a Value)>,
    storage: StorageType,
) -> PolarsResult<Vec<(String, Value)>> {
    let (keys, values): (Vec<String>, Vec<&Value>) = pairs
        .filter(|(cat, _)| !cat.is_missing())
        .map(|(cat, val)| (cat.to_string(), val))
        .unzip();
    let integer = storage == StorageType::Int64;
    let value_series = if integer {
        int_series(VALUE, values.into_iter())
    } else {
        float_series(VALUE, values.into_iter())
    };
    let df = DataFrame::new_infer_height(vec![
        Series::new(KEY.into(), keys).into(),
        value_series.into(),
    ])?;
    let out = df
        .lazy()
        .group_by_stable([col(KEY)])
        .agg([col(VALUE).sum().alias(TOTAL)])
        .collect()?;

    let keys = out.column(KEY)?.str()?;
    let totals = out.column(TOTAL)?;
    let totals: Vec<Value> = if integer {
        totals
            .i64()?
            .into_iter()
            .map(|n| Value::Int64(n.unwrap_or(0)))
            .collect()
    } else {
        totals
            .f64()?
            .into_iter()
            .map(|x| Value::Float64(x.unwrap_or(0.0)))
            .collect()
    };
    Ok(keys
        .into_iter()
        .zip(totals)
        .filter_map(|(k, total)| Some((k?.to_string(), total)))
        .collect())
}
