//! Format detection and dispatch.
//!
//! Uploads are typed by the extension of the *original* filename (the local path is usually a
//! temp file with an arbitrary name). [`load_raw`] reads the file with the matching loader.

use std::path::Path;

use crate::error::{IngestionError, IngestionResult};
use crate::types::Table;

use super::csv;

/// Supported upload formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestionFormat {
    /// Comma-separated values.
    Csv,
    /// Tab-separated values.
    Tsv,
    /// Spreadsheet/workbook formats (feature-gated behind `excel`).
    Excel,
}

impl IngestionFormat {
    /// Every extension accepted for upload, lower-case and without the dot.
    pub const EXTENSIONS: &'static [&'static str] =
        &["csv", "tsv", "xlsx", "xls", "xlsm", "xlsb", "ods"];

    /// Parse an ingestion format from a file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "csv" => Some(Self::Csv),
            "tsv" => Some(Self::Tsv),
            "xlsx" | "xls" | "xlsm" | "xlsb" | "ods" => Some(Self::Excel),
            _ => None,
        }
    }

    /// Choose the format from an uploaded filename.
    pub fn from_filename(filename: &str) -> IngestionResult<Self> {
        Path::new(filename)
            .extension()
            .and_then(|s| s.to_str())
            .and_then(Self::from_extension)
            .ok_or_else(|| IngestionError::UnsupportedFormat {
                filename: filename.to_string(),
            })
    }
}

/// Read `path` as `format` into a raw table.
///
/// `parse_dates` enables ISO date detection for delimited text; spreadsheets carry their own
/// date cells.
pub fn load_raw(path: &Path, format: IngestionFormat, parse_dates: bool) -> IngestionResult<Table> {
    match format {
        IngestionFormat::Csv => csv::load_delimited_from_path(path, b',', parse_dates),
        IngestionFormat::Tsv => csv::load_delimited_from_path(path, b'\t', parse_dates),
        IngestionFormat::Excel => load_excel_dispatch(path),
    }
}

fn load_excel_dispatch(path: &Path) -> IngestionResult<Table> {
    #[cfg(feature = "excel")]
    {
        super::excel::load_excel_from_path(path)
    }

    #[cfg(not(feature = "excel"))]
    {
        Err(IngestionError::UnsupportedFormat {
            filename: format!("{} (excel support not enabled)", path.display()),
        })
    }
}
