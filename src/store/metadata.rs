//! The durable metadata record of an ingested table.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::cleaning::CleanedTable;
use crate::error::IngestionResult;
use crate::schema::SchemaMap;
use crate::summary::SummaryReport;

use super::TableId;

/// Number of leading rows copied into [`IngestionMetadata::sample_rows`].
pub const SAMPLE_ROW_COUNT: usize = 5;

/// Everything known about an ingested table without reloading it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionMetadata {
    pub file_id: TableId,
    /// Filename as uploaded.
    pub filename: String,
    pub schema: SchemaMap,
    pub summary: SummaryReport,
    /// The first rows as column-ordered objects; datetimes as display strings, missing as `null`.
    pub sample_rows: Vec<Map<String, JsonValue>>,
    pub row_count: usize,
    pub column_count: usize,
}

impl IngestionMetadata {
    pub fn new(
        file_id: TableId,
        filename: impl Into<String>,
        schema: SchemaMap,
        summary: SummaryReport,
        table: &CleanedTable,
    ) -> IngestionResult<Self> {
        Ok(Self {
            file_id,
            filename: filename.into(),
            schema,
            summary,
            sample_rows: sample_rows(table, SAMPLE_ROW_COUNT)?,
            row_count: table.row_count(),
            column_count: table.column_count(),
        })
    }
}

/// The first `n` rows of `table` as JSON objects keyed by column name.
pub fn sample_rows(table: &CleanedTable, n: usize) -> IngestionResult<Vec<Map<String, JsonValue>>> {
    table
        .head(n)
        .iter()
        .map(|row| {
            table
                .schema
                .fields
                .iter()
                .enumerate()
                .map(|(idx, field)| -> IngestionResult<(String, JsonValue)> {
                    let cell = match row.get(idx) {
                        Some(v) => serde_json::to_value(v)?,
                        None => JsonValue::Null,
                    };
                    Ok((field.name.clone(), cell))
                })
                .collect::<IngestionResult<Map<String, JsonValue>>>()
        })
        .collect()
}

/// Write `metadata` as pretty-printed JSON.
pub fn write_metadata(path: &Path, metadata: &IngestionMetadata) -> IngestionResult<()> {
    let mut out = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut out, metadata)?;
    out.flush()?;
    Ok(())
}

pub fn read_metadata(path: &Path) -> IngestionResult<IngestionMetadata> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}
