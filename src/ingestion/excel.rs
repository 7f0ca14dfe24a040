#![cfg(feature = "excel")]

//! Spreadsheet (`.xlsx`, `.xls`, `.xlsm`, `.xlsb`, `.ods`) loading.

use std::path::Path;

use calamine::{open_workbook_auto, Data, DataType as _, Reader};

use crate::error::{IngestionError, IngestionResult};
use crate::types::{Field, Schema, StorageType, Table, Value};

use super::csv::transpose;
use super::infer::{normalize_headers, truncate_to_micros};

static EMPTY: Data = Data::Empty;

/// Load the first sheet of a workbook into a raw [`Table`].
///
/// Behavior:
/// - Detects the first non-empty row as the header row
/// - Every later row is a data row; short rows are padded with missing cells
/// - Empty and error cells load as missing
/// - Each column's storage type is chosen from the cell kinds it contains
pub fn load_excel_from_path(path: impl AsRef<Path>) -> IngestionResult<Table> {
    let mut workbook = open_workbook_auto(path)?;
    let sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| IngestionError::malformed("workbook has no sheets"))?;
    let range = workbook.worksheet_range(&sheet)?;
    load_sheet_range(&range).map_err(|e| wrap_malformed_with_sheet(&sheet, e))
}

fn wrap_malformed_with_sheet(sheet: &str, err: IngestionError) -> IngestionError {
    match err {
        IngestionError::MalformedInput { message } => IngestionError::MalformedInput {
            message: format!("sheet '{sheet}': {message}"),
        },
        other => other,
    }
}

fn load_sheet_range(range: &calamine::Range<Data>) -> IngestionResult<Table> {
    let mut rows = range.rows();
    let header = rows
        .by_ref()
        .find(|row| row.iter().any(|c| !is_missing_cell(c)))
        .ok_or_else(|| {
            IngestionError::malformed("sheet has no non-empty rows (no header row found)")
        })?;

    // Trailing empty header cells widen the range but carry no column.
    let width = header
        .iter()
        .rposition(|c| !is_missing_cell(c))
        .map_or(0, |last| last + 1);
    let names = normalize_headers(header[..width].iter().map(cell_to_header_string));

    let body: Vec<&[Data]> = rows.collect();
    let mut fields = Vec::with_capacity(width);
    let mut columns = Vec::with_capacity(width);
    for (col_idx, name) in names.into_iter().enumerate() {
        let cells: Vec<&Data> = body
            .iter()
            .map(|row| row.get(col_idx).unwrap_or(&EMPTY))
            .collect();
        let (storage, values) = convert_column(&cells);
        fields.push(Field::new(name, storage));
        columns.push(values);
    }

    Ok(Table::new(Schema::new(fields), transpose(columns, body.len())))
}

fn is_missing_cell(c: &Data) -> bool {
    matches!(c, Data::Empty | Data::Error(_))
}

fn cell_to_header_string(c: &Data) -> String {
    match c {
        Data::String(s) => s.clone(),
        Data::Float(f) if f.fract() == 0.0 => (*f as i64).to_string(),
        Data::Empty | Data::Error(_) => String::new(),
        other => other.to_string(),
    }
}

fn convert_column(cells: &[&Data]) -> (StorageType, Vec<Value>) {
    let present = || cells.iter().copied().filter(|c| !is_missing_cell(c));

    let storage = if present().next().is_none() {
        StorageType::Utf8
    } else if present().all(|c| matches!(c, Data::Bool(_))) {
        StorageType::Bool
    } else if present().all(is_integral) {
        StorageType::Int64
    } else if present().all(|c| matches!(c, Data::Int(_) | Data::Float(_))) {
        StorageType::Float64
    } else if present().all(|c| c.as_datetime().is_some()) {
        StorageType::Datetime
    } else {
        StorageType::Utf8
    };

    let values = cells
        .iter()
        .map(|c| {
            if is_missing_cell(c) {
                return Value::Null;
            }
            match storage {
                StorageType::Bool => match c {
                    Data::Bool(b) => Value::Bool(*b),
                    _ => Value::Null,
                },
                StorageType::Int64 => match c {
                    Data::Int(i) => Value::Int64(*i),
                    Data::Float(f) => Value::Int64(*f as i64),
                    _ => Value::Null,
                },
                StorageType::Float64 => match c {
                    Data::Int(i) => Value::Float64(*i as f64),
                    Data::Float(f) => Value::Float64(*f),
                    _ => Value::Null,
                },
                StorageType::Datetime => c
                    .as_datetime()
                    .map_or(Value::Null, |dt| Value::Datetime(truncate_to_micros(dt))),
                StorageType::Utf8 => Value::Utf8(cell_to_string(c)),
            }
        })
        .collect();

    (storage, values)
}

fn is_integral(c: &Data) -> bool {
    match c {
        Data::Int(_) => true,
        Data::Float(f) => f.fract() == 0.0 && f.abs() < i64::MAX as f64,
        _ => false,
    }
}

fn cell_to_string(c: &Data) -> String {
    match c {
        Data::String(s) => s.clone(),
        Data::Bool(b) => Value::Bool(*b).to_string(),
        _ => match c.as_datetime() {
            Some(dt) => Value::Datetime(dt).to_string(),
            None => c.to_string(),
        },
    }
}
