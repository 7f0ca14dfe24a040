//! `data-copilot` turns uploaded tabular files into cleaned, typed, summarised tables that a
//! question-answering component and a chart front end can use without re-deriving anything.
//!
//! The primary entrypoint is [`store::TableStore::ingest`]: it loads a file, cleans it, infers a
//! [`schema::SchemaMap`], computes a [`summary::SummaryReport`], persists everything under a fresh
//! [`store::TableId`], and caches the table in memory.
//!
//! ## What you can ingest
//!
//! **File formats (chosen by the extension of the uploaded filename):**
//!
//! - **CSV**: `.csv`
//! - **TSV**: `.tsv`
//! - **Excel/workbooks** (Cargo feature `excel`, on by default): `.xlsx`, `.xls`, `.xlsm`,
//!   `.xlsb`, `.ods`
//!
//! Column storage types are inferred from the cells ([`types::StorageType`]) and mapped to the
//! logical types consumers see ([`schema::LogicalType`]).
//!
//! ## Quick example: ingest and read back
//!
//! ```no_run
//! use data_copilot::config::StoreConfig;
//! use data_copilot::store::TableStore;
//!
//! # fn main() -> Result<(), data_copilot::IngestionError> {
//! let store = TableStore::new(StoreConfig::default().with_data_dir("./uploads"));
//! let (id, metadata) = store.ingest("/tmp/upload-1234", "sales.csv")?;
//! println!("{} rows, schema: {:?}", metadata.row_count, metadata.schema);
//!
//! let table = store.get_table(&id)?;
//! assert_eq!(table.row_count(), metadata.row_count);
//! # Ok(())
//! # }
//! ```
//!
//! ## Charts
//!
//! ```no_run
//! use data_copilot::chart::shape_chart;
//! # use data_copilot::{config::StoreConfig, store::TableStore};
//!
//! # fn main() -> Result<(), data_copilot::IngestionError> {
//! # let store = TableStore::new(StoreConfig::default());
//! # let (id, _) = store.ingest("/tmp/upload-1234", "sales.csv")?;
//! let table = store.get_table(&id)?;
//! if let Some(chart) = shape_chart(&table, "bar", "region", Some("revenue"))? {
//!     println!("{}", serde_json::to_string(&chart)?);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`ingestion`]: format detection, raw loaders, type inference, ingestion observers
//! - [`cleaning`]: whitespace and blank-cell normalization
//! - [`schema`]: logical schema inference
//! - [`summary`]: descriptive statistics
//! - [`store`]: durable storage, memory cache and the ingest entrypoint
//! - [`chart`]: chart-ready data shaping
//! - [`answer`]: the question-answering boundary
//! - [`upload`]: upload staging
//! - [`config`]: store settings
//! - [`error`]: error types

pub mod answer;
pub mod chart;
pub mod cleaning;
pub mod config;
pub mod error;
mod frame;
pub mod ingestion;
pub mod schema;
pub mod serde_helpers;
pub mod store;
pub mod summary;
pub mod types;
pub mod upload;

pub use error::{IngestionError, IngestionResult};
