//! The table store: ingestion entry point, durable artifacts, and the memory cache.
//!
//! Layout under [`StoreConfig::data_dir`]:
//!
//! - `<id>.parquet`: the cleaned table
//! - `<id>_metadata.json`: the [`IngestionMetadata`] record
//!
//! Each file is written to a `.tmp` sibling and renamed into place. The table file is committed
//! first and the metadata file last, so the metadata record marks a complete ingest: an
//! identifier whose metadata file is absent does not exist as far as the store is concerned.

pub mod cache;
pub mod metadata;
pub mod parquet;

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::cleaning::{clean, CleanedTable};
use crate::config::StoreConfig;
use crate::error::{IngestionError, IngestionResult};
use crate::ingestion::{
    load_raw, IngestionContext, IngestionFormat, IngestionObserver, IngestionSeverity,
    IngestionStats, TracingObserver,
};
use crate::schema::infer_schema;
use crate::summary::summarize;
use crate::types::Table;
use crate::upload::{stage_upload, UploadPolicy};

pub use cache::{LruTableCache, TableCache};
pub use metadata::IngestionMetadata;

/// Identifier of an ingested table (a random UUID, never reused).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableId(Uuid);

impl TableId {
    /// Mint a fresh identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The underlying version 4 UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TableId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Text that is not a UUID can never name a stored table, so it parses to `NotFound`.
impl FromStr for TableId {
    type Err = IngestionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| IngestionError::not_found(s))
    }
}

/// Loads, persists and serves cleaned tables by [`TableId`].
///
/// `TableStore` is `Send + Sync`; share it behind an `Arc`.
pub struct TableStore {
    config: StoreConfig,
    cache: Arc<dyn TableCache>,
    observer: Arc<dyn IngestionObserver>,
    alert_at_or_above: IngestionSeverity,
}

impl fmt::Debug for TableStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableStore")
            .field("config", &self.config)
            .field("cached", &self.cache.len())
            .field("alert_at_or_above", &self.alert_at_or_above)
            .finish()
    }
}

impl TableStore {
    /// Create a store with an [`LruTableCache`] of the configured capacity, reporting through
    /// [`TracingObserver`].
    pub fn new(config: StoreConfig) -> Self {
        let cache = Arc::new(LruTableCache::new(config.cache_capacity));
        Self {
            config,
            cache,
            observer: Arc::new(TracingObserver),
            alert_at_or_above: IngestionSeverity::Critical,
        }
    }

    /// Replace the memory cache.
    pub fn with_cache(mut self, cache: Arc<dyn TableCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Replace the ingestion observer.
    pub fn with_observer(mut self, observer: Arc<dyn IngestionObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Failures at or above `severity` are also reported through
    /// [`IngestionObserver::on_alert`].
    pub fn with_alert_threshold(mut self, severity: IngestionSeverity) -> Self {
        self.alert_at_or_above = severity;
        self
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Ingest the file at `path`, typed by the extension of `filename` (the name it was uploaded
    /// under).
    ///
    /// The raw table is loaded, validated, cleaned, and summarised; the cleaned table and its
    /// metadata are persisted and the table is cached. Nothing is committed on failure.
    pub fn ingest(
        &self,
        path: impl AsRef<Path>,
        filename: &str,
    ) -> IngestionResult<(TableId, IngestionMetadata)> {
        let path = path.as_ref();
        let format = IngestionFormat::from_filename(filename);
        let ctx = IngestionContext {
            filename: filename.to_string(),
            path: path.to_path_buf(),
            format: format.as_ref().ok().copied(),
        };
        let result = format.and_then(|format| self.ingest_format(path, filename, format));
        self.report(&ctx, &result);
        result
    }

    /// Stage an upload from `reader` (size and extension checked, see [`crate::upload`]) and
    /// ingest it. The staged file is removed afterwards whatever the outcome.
    pub fn ingest_upload<R: Read>(
        &self,
        reader: R,
        filename: &str,
    ) -> IngestionResult<(TableId, IngestionMetadata)> {
        let policy = UploadPolicy::from_config(&self.config);
        let staged = match stage_upload(reader, filename, &self.config.data_dir, &policy) {
            Ok(staged) => staged,
            Err(e) => {
                let ctx = IngestionContext {
                    filename: filename.to_string(),
                    path: self.config.data_dir.clone(),
                    format: IngestionFormat::from_filename(filename).ok(),
                };
                let result = Err(e);
                self.report(&ctx, &result);
                return result;
            }
        };
        self.ingest(staged.path(), filename)
    }

    /// The cleaned table for `id`: from the cache, else from durable storage (and then cached).
    pub fn get_table(&self, id: &TableId) -> IngestionResult<Arc<CleanedTable>> {
        if let Some(table) = self.cache.get(id) {
            debug!(table_id = %id, "table cache hit");
            return Ok(table);
        }
        debug!(table_id = %id, "table cache miss");

        let table_path = self.table_path(id);
        if !self.metadata_path(id).is_file() || !table_path.is_file() {
            return Err(IngestionError::not_found(id));
        }
        let table = Arc::new(CleanedTable::from_persisted(parquet::read_table(&table_path)?));
        self.cache_table(*id, Arc::clone(&table));
        Ok(table)
    }

    /// The metadata record for `id`, read from durable storage. Does not touch the cache.
    pub fn get_metadata(&self, id: &TableId) -> IngestionResult<IngestionMetadata> {
        let path = self.metadata_path(id);
        if !path.is_file() {
            return Err(IngestionError::not_found(id));
        }
        metadata::read_metadata(&path)
    }

    /// Path of the durable table file for `id`.
    pub fn table_path(&self, id: &TableId) -> PathBuf {
        self.config.data_dir.join(format!("{id}.parquet"))
    }

    /// Path of the durable metadata record for `id`.
    pub fn metadata_path(&self, id: &TableId) -> PathBuf {
        self.config.data_dir.join(format!("{id}_metadata.json"))
    }

    fn ingest_format(
        &self,
        path: &Path,
        filename: &str,
        format: IngestionFormat,
    ) -> IngestionResult<(TableId, IngestionMetadata)> {
        let raw = load_raw(path, format, self.config.parse_dates)?;
        validate_shape(&raw)?;

        let cleaned = clean(raw);
        let schema = infer_schema(&cleaned);
        let summary = summarize(&cleaned);
        let id = TableId::new();
        let metadata = IngestionMetadata::new(id, filename, schema, summary, &cleaned)?;

        fs::create_dir_all(&self.config.data_dir)?;
        let table_path = self.table_path(&id);
        commit_file(&table_path, |tmp| parquet::write_table(tmp, &cleaned))?;
        if let Err(e) = commit_file(&self.metadata_path(&id), |tmp| {
            metadata::write_metadata(tmp, &metadata)
        }) {
            let _ = fs::remove_file(&table_path);
            return Err(e);
        }

        self.cache_table(id, Arc::new(cleaned));
        Ok((id, metadata))
    }

    fn cache_table(&self, id: TableId, table: Arc<CleanedTable>) {
        if let Some(evicted) = self.cache.insert(id, table) {
            debug!(table_id = %evicted, "table evicted from cache");
        }
    }

    fn report(
        &self,
        ctx: &IngestionContext,
        result: &IngestionResult<(TableId, IngestionMetadata)>,
    ) {
        match result {
            Ok((id, metadata)) => {
                let stats = IngestionStats {
                    table_id: id.to_string(),
                    rows: metadata.row_count,
                    columns: metadata.column_count,
                };
                self.observer.on_success(ctx, &stats);
            }
            Err(e) => {
                let severity = IngestionSeverity::for_error(e);
                self.observer.on_failure(ctx, severity, e);
                if severity >= self.alert_at_or_above {
                    self.observer.on_alert(ctx, severity, e);
                }
            }
        }
    }
}

/// Reject tables no downstream component can address: no columns, or names that collide once
/// trimmed.
fn validate_shape(table: &Table) -> IngestionResult<()> {
    if table.schema.is_empty() {
        return Err(IngestionError::malformed("file has no columns"));
    }
    let mut seen = HashSet::with_capacity(table.schema.len());
    for name in table.schema.field_names() {
        let trimmed = name.trim();
        if !seen.insert(trimmed) {
            return Err(IngestionError::malformed(format!(
                "column name '{trimmed}' appears more than once after trimming whitespace"
            )));
        }
    }
    Ok(())
}

/// Write `path` through a `.tmp` sibling and rename it into place.
fn commit_file<F>(path: &Path, write: F) -> IngestionResult<()>
where
    F: FnOnce(&Path) -> IngestionResult<()>,
{
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    let result = write(&tmp).and_then(|()| fs::rename(&tmp, path).map_err(IngestionError::from));
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::{validate_shape, TableId};
    use crate::types::{Field, Schema, StorageType, Table};

    #[test]
    fn table_id_parses_its_own_display() {
        let id = TableId::new();
        assert_eq!(TableId::from_str(&id.to_string()).unwrap(), id);
        assert_ne!(TableId::new(), id);
    }

    #[test]
    fn table_id_is_a_random_uuid() {
        let id = TableId::new();
        assert_eq!(id.as_uuid().get_version_num(), 4);
        assert_eq!(id.as_uuid().to_string(), id.to_string());
    }

    #[test]
    fn non_uuid_text_is_not_found() {
        let err = "../../etc/passwd".parse::<TableId>().unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn shape_validation() {
        let empty = Table::new(Schema::new(vec![]), vec![]);
        assert!(validate_shape(&empty).is_err());

        let colliding = Table::new(
            Schema::new(vec![
                Field::new("a ", StorageType::Int64),
                Field::new(" a", StorageType::Int64),
            ]),
            vec![],
        );
        let err = validate_shape(&colliding).unwrap_err();
        assert!(err.to_string().contains("'a'"));

        let ok = Table::new(Schema::new(vec![Field::new("a", StorageType::Utf8)]), vec![]);
        assert!(validate_shape(&ok).is_ok());
    }
}
