//! Delimited text (CSV / TSV) loading.

use std::path::Path;

use crate::error::{IngestionError, IngestionResult};
use crate::types::{Field, Schema, Table, Value};

use super::infer::{infer_text_column, is_na_token, normalize_headers};

/// Load a delimited text file into a raw [`Table`].
///
/// Rules:
///
/// - The first record is the header row.
/// - Cells matching an NA token load as missing; rows shorter than the header are padded with
///   missing cells.
/// - A row with more cells than the header is malformed.
/// - Each column's storage type is inferred from its cells.
pub fn load_delimited_from_path(
    path: impl AsRef<Path>,
    delimiter: u8,
    parse_dates: bool,
) -> IngestionResult<Table> {
    let mut rdr = reader_builder(delimiter).from_path(path)?;
    load_delimited_from_reader(&mut rdr, parse_dates)
}

/// Reader configuration used for uploads.
pub fn reader_builder(delimiter: u8) -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(true)
        .delimiter(delimiter)
        .flexible(true);
    builder
}

/// Load delimited text from an existing reader.
pub fn load_delimited_from_reader<R: std::io::Read>(
    rdr: &mut csv::Reader<R>,
    parse_dates: bool,
) -> IngestionResult<Table> {
    let headers = rdr.headers()?.clone();
    if headers.is_empty() || (headers.len() == 1 && headers[0].is_empty()) {
        return Err(IngestionError::malformed("file has no header row"));
    }
    let names = normalize_headers(headers.iter().map(str::to_owned));
    let width = names.len();

    let mut records = Vec::new();
    for (row_idx0, result) in rdr.records().enumerate() {
        // Report 1-based row number for users; +1 again because header is row 1.
        let user_row = row_idx0 + 2;
        let record = result?;
        if record.len() > width {
            return Err(IngestionError::malformed(format!(
                "row {user_row} has {} fields but the header has {width}",
                record.len()
            )));
        }
        records.push(record);
    }

    let mut fields = Vec::with_capacity(width);
    let mut columns = Vec::with_capacity(width);
    for (col_idx, name) in names.into_iter().enumerate() {
        let cells: Vec<Option<&str>> = records
            .iter()
            .map(|r| r.get(col_idx).filter(|raw| !is_na_token(raw)))
            .collect();
        let (storage, values) = infer_text_column(&cells, parse_dates);
        fields.push(Field::new(name, storage));
        columns.push(values);
    }

    Ok(Table::new(Schema::new(fields), transpose(columns, records.len())))
}

/// Turn per-column cell vectors into row-major storage.
pub(crate) fn transpose(columns: Vec<Vec<Value>>, row_count: usize) -> Vec<Vec<Value>> {
    let mut rows: Vec<Vec<Value>> = (0..row_count)
        .map(|_| Vec::with_capacity(columns.len()))
        .collect();
    for column in columns {
        for (row, value) in rows.iter_mut().zip(column) {
            row.push(value);
        }
    }
    rows
}
