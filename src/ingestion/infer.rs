//! Storage type inference shared by the format loaders.
//!
//! Loaders hand over one column at a time. Text-based formats pass raw cell text; the
//! inference here picks the narrowest [`StorageType`] every non-missing cell fits and converts
//! the cells accordingly.

use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime, Timelike};

use crate::types::{StorageType, Value};

/// Cell texts that load as missing.
pub const NA_TOKENS: &[&str] = &[
    "", "NA", "N/A", "n/a", "NULL", "null", "NaN", "nan", "None", "#N/A", "<NA>",
];

const TRUE_LITERALS: &[&str] = &["True", "TRUE", "true"];
const FALSE_LITERALS: &[&str] = &["False", "FALSE", "false"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// `true` if `raw` is one of the [`NA_TOKENS`].
pub fn is_na_token(raw: &str) -> bool {
    NA_TOKENS.contains(&raw)
}

/// Make header names usable as column names.
///
/// Blank headers become `Unnamed: {index}`. A repeated header gets a `.{n}` suffix, counting from
/// 1 for the first repeat; when the suffixed name is itself taken, suffixing continues on it until
/// the name is free. `a, a, a.1` becomes `a, a.1, a.1.1`.
pub fn normalize_headers(raw: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut out = Vec::new();
    for (idx, name) in raw.into_iter().enumerate() {
        let mut name = if name.trim().is_empty() {
            format!("Unnamed: {idx}")
        } else {
            name
        };
        let mut seen = counts.get(&name).copied().unwrap_or(0);
        while seen > 0 {
            counts.insert(name.clone(), seen + 1);
            name = format!("{name}.{seen}");
            seen = counts.get(&name).copied().unwrap_or(0);
        }
        counts.insert(name.clone(), 1);
        out.push(name);
    }
    out
}

/// Infer a storage type for a column of raw text cells and convert them.
///
/// `None` cells are missing. Candidates are tried narrowest first: integer, float, boolean,
/// datetime (only with `parse_dates`), text. Text columns keep the cells untrimmed. A column with
/// no present cells is text.
pub fn infer_text_column(cells: &[Option<&str>], parse_dates: bool) -> (StorageType, Vec<Value>) {
    let present = || cells.iter().flatten().copied();

    if present().next().is_none() {
        return (StorageType::Utf8, vec![Value::Null; cells.len()]);
    }

    if present().all(|s| s.trim().parse::<i64>().is_ok()) {
        return (
            StorageType::Int64,
            convert(cells, |s| s.trim().parse::<i64>().ok().map(Value::Int64)),
        );
    }
    if present().all(|s| s.trim().parse::<f64>().is_ok()) {
        return (
            StorageType::Float64,
            convert(cells, |s| {
                s.trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|x| !x.is_nan())
                    .map(Value::Float64)
            }),
        );
    }
    if present().all(|s| parse_bool_literal(s).is_some()) {
        return (
            StorageType::Bool,
            convert(cells, |s| parse_bool_literal(s).map(Value::Bool)),
        );
    }
    if parse_dates && present().all(|s| parse_datetime(s).is_some()) {
        return (
            StorageType::Datetime,
            convert(cells, |s| parse_datetime(s).map(Value::Datetime)),
        );
    }

    (
        StorageType::Utf8,
        convert(cells, |s| Some(Value::Utf8(s.to_owned()))),
    )
}

fn convert<F>(cells: &[Option<&str>], parse: F) -> Vec<Value>
where
    F: Fn(&str) -> Option<Value>,
{
    cells
        .iter()
        .map(|c| c.and_then(&parse).unwrap_or(Value::Null))
        .collect()
}

fn parse_bool_literal(s: &str) -> Option<bool> {
    let s = s.trim();
    if TRUE_LITERALS.contains(&s) {
        Some(true)
    } else if FALSE_LITERALS.contains(&s) {
        Some(false)
    } else {
        None
    }
}

/// Parse an ISO-8601 date or datetime. Plain dates map to midnight.
///
/// Fractional seconds are kept to microsecond precision, the resolution tables are stored at.
pub fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .map(truncate_to_micros)
}

/// Drop sub-microsecond digits.
pub fn truncate_to_micros(dt: NaiveDateTime) -> NaiveDateTime {
    dt.with_nanosecond(dt.nanosecond() / 1_000 * 1_000)
        .unwrap_or(dt)
}
