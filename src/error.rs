use thiserror::Error;

/// Convenience result type for ingestion and store operations.
pub type IngestionResult<T> = Result<T, IngestionError>;

/// Error type returned by the ingestion pipeline, the table store and the chart shaper.
///
/// The first three variants are the contract-level conditions callers are expected to branch on
/// (`UnsupportedFormat` -> bad request, `NotFound` -> missing resource, `MalformedInput` -> the
/// file could not be turned into a table). The wrapped variants carry the underlying library
/// error unchanged.
#[derive(Debug, Error)]
pub enum IngestionError {
    /// The original filename does not end in a supported extension.
    #[error("unsupported file format: '{filename}'")]
    UnsupportedFormat { filename: String },

    /// No durable artifact exists for the identifier.
    #[error("table '{id}' not found")]
    NotFound { id: String },

    /// The file parsed, but it is not a usable table (no columns, colliding headers, ragged rows).
    #[error("malformed input: {message}")]
    MalformedInput { message: String },

    /// An upload exceeded the configured byte limit.
    #[error("upload exceeds the {limit} byte limit")]
    PayloadTooLarge { limit: u64 },

    /// A chart request named a column the table does not have.
    #[error("unknown column '{column}'")]
    UnknownColumn { column: String },

    /// A configuration value could not be parsed.
    #[error("invalid configuration: {message}")]
    Config { message: String },

    /// Underlying I/O error (e.g. file not found, permission denied).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "excel")]
    /// Spreadsheet reader error (feature-gated behind `excel`).
    #[error("excel error: {0}")]
    Excel(#[from] calamine::Error),

    /// Delimited-text reader error.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// Parquet read/write error for the durable table file.
    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// Columnar engine error while summarising or shaping a table.
    #[error("polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    /// Metadata record (de)serialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl IngestionError {
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedInput {
            message: message.into(),
        }
    }

    pub(crate) fn not_found(id: impl ToString) -> Self {
        Self::NotFound { id: id.to_string() }
    }

    /// `true` for [`IngestionError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
