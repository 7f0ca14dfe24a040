//! Raw file loading.
//!
//! [`load_raw`] (from [`unified`]) reads an uploaded file into a raw [`crate::types::Table`]:
//!
//! - the format comes from the original filename's extension ([`IngestionFormat::from_filename`])
//! - every column gets a storage type inferred from its cells ([`infer`])
//!
//! Format-specific loaders live under [`csv`] (comma and tab delimited) and `excel`
//! (feature-gated). Ingestion outcomes are reported through [`IngestionObserver`]s.

pub mod csv;
#[cfg(feature = "excel")]
pub mod excel;
pub mod infer;
pub mod observability;
pub mod unified;

pub use observability::{
    CompositeObserver, FileObserver, IngestionContext, IngestionObserver, IngestionSeverity,
    IngestionStats, TracingObserver,
};
pub use unified::{load_raw, IngestionFormat};
