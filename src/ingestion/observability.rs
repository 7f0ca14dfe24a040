use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::Utc;

use crate::error::IngestionError;

use super::unified::IngestionFormat;

/// Severity classification used for observer callbacks and alerting thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IngestionSeverity {
    /// Informational event.
    Info,
    /// Warning-level event (non-fatal).
    Warning,
    /// Error-level event (operation failed).
    Error,
    /// Critical error (typically I/O or other infrastructure failures).
    Critical,
}

impl IngestionSeverity {
    /// Severity of an ingestion failure.
    ///
    /// Rejected input is a `Warning`; anything that points at the host (I/O, storage) is
    /// `Critical`.
    pub fn for_error(e: &IngestionError) -> Self {
        match e {
            IngestionError::Io(_) => Self::Critical,
            IngestionError::Parquet(_) => Self::Critical,
            IngestionError::Csv(err) => match err.kind() {
                ::csv::ErrorKind::Io(_) => Self::Critical,
                _ => Self::Error,
            },
            #[cfg(feature = "excel")]
            IngestionError::Excel(_) => Self::Error,
            IngestionError::Json(_) | IngestionError::Polars(_) => Self::Error,
            IngestionError::UnsupportedFormat { .. }
            | IngestionError::PayloadTooLarge { .. }
            | IngestionError::MalformedInput { .. } => Self::Warning,
            IngestionError::NotFound { .. }
            | IngestionError::UnknownColumn { .. }
            | IngestionError::Config { .. } => Self::Error,
        }
    }
}

/// Context about an ingestion attempt.
#[derive(Debug, Clone)]
pub struct IngestionContext {
    /// Filename as uploaded by the user.
    pub filename: String,
    /// Local path the file was read from.
    pub path: PathBuf,
    /// Format chosen from the filename, if it was recognised.
    pub format: Option<IngestionFormat>,
}

/// Stats reported on successful ingestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestionStats {
    /// Identifier minted for the table.
    pub table_id: String,
    /// Number of ingested rows.
    pub rows: usize,
    /// Number of ingested columns.
    pub columns: usize,
}

/// Observer interface for ingestion outcomes.
///
/// Implementors can record metrics, logs, or trigger alerts.
pub trait IngestionObserver: Send + Sync {
    /// Called when ingestion succeeds.
    fn on_success(&self, _ctx: &IngestionContext, _stats: &IngestionStats) {}

    /// Called when ingestion fails.
    fn on_failure(
        &self,
        _ctx: &IngestionContext,
        _severity: IngestionSeverity,
        _error: &IngestionError,
    ) {}

    /// Called when an ingestion failure meets an alert threshold.
    ///
    /// Default behavior forwards to [`Self::on_failure`].
    fn on_alert(
        &self,
        ctx: &IngestionContext,
        severity: IngestionSeverity,
        error: &IngestionError,
    ) {
        self.on_failure(ctx, severity, error)
    }
}

/// An observer that fans out callbacks to a list of observers.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn IngestionObserver>>,
}

impl CompositeObserver {
    /// Create a new composite observer from a list of observers.
    pub fn new(observers: Vec<Arc<dyn IngestionObserver>>) -> Self {
        Self { observers }
    }
}

impl fmt::Debug for CompositeObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeObserver")
            .field("observers_len", &self.observers.len())
            .finish()
    }
}

impl IngestionObserver for CompositeObserver {
    fn on_success(&self, ctx: &IngestionContext, stats: &IngestionStats) {
        for o in &self.observers {
            o.on_success(ctx, stats);
        }
    }

    fn on_failure(
        &self,
        ctx: &IngestionContext,
        severity: IngestionSeverity,
        error: &IngestionError,
    ) {
        for o in &self.observers {
            o.on_failure(ctx, severity, error);
        }
    }

    fn on_alert(
        &self,
        ctx: &IngestionContext,
        severity: IngestionSeverity,
        error: &IngestionError,
    ) {
        for o in &self.observers {
            o.on_alert(ctx, severity, error);
        }
    }
}

/// Emits ingestion events through `tracing`.
///
/// This is the observer a [`crate::store::TableStore`] uses when none is configured.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl IngestionObserver for TracingObserver {
    fn on_success(&self, ctx: &IngestionContext, stats: &IngestionStats) {
        tracing::info!(
            table_id = %stats.table_id,
            filename = %ctx.filename,
            format = ?ctx.format,
            rows = stats.rows,
            columns = stats.columns,
            "ingested table"
        );
    }

    fn on_failure(
        &self,
        ctx: &IngestionContext,
        severity: IngestionSeverity,
        error: &IngestionError,
    ) {
        tracing::warn!(
            filename = %ctx.filename,
            path = %ctx.path.display(),
            format = ?ctx.format,
            ?severity,
            %error,
            "ingestion failed"
        );
    }

    fn on_alert(
        &self,
        ctx: &IngestionContext,
        severity: IngestionSeverity,
        error: &IngestionError,
    ) {
        tracing::error!(
            filename = %ctx.filename,
            path = %ctx.path.display(),
            format = ?ctx.format,
            ?severity,
            %error,
            "ingestion alert"
        );
    }
}

/// Appends ingestion events to a local log file.
#[derive(Debug)]
pub struct FileObserver {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileObserver {
    /// Create a file observer that appends events to `path`.
    ///
    /// Writes are best-effort; failures to open/write the log file are ignored.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    fn append_line(&self, line: &str) {
        let _guard = self.lock.lock().ok();
        if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(&self.path) {
            let _ = writeln!(f, "{line}");
        }
    }
}

impl IngestionObserver for FileObserver {
    fn on_success(&self, ctx: &IngestionContext, stats: &IngestionStats) {
        self.append_line(&format!(
            "{} ok id={} format={:?} file={} rows={} columns={}",
            Utc::now().to_rfc3339(),
            stats.table_id,
            ctx.format,
            ctx.filename,
            stats.rows,
            stats.columns
        ));
    }

    fn on_failure(
        &self,
        ctx: &IngestionContext,
        severity: IngestionSeverity,
        error: &IngestionError,
    ) {
        self.append_line(&format!(
            "{} fail severity={:?} format={:?} file={} err={}",
            Utc::now().to_rfc3339(),
            severity,
            ctx.format,
            ctx.filename,
            error
        ));
    }

    fn on_alert(
        &self,
        ctx: &IngestionContext,
        severity: IngestionSeverity,
        error: &IngestionError,
    ) {
        self.append_line(&format!(
            "{} ALERT severity={:?} format={:?} file={} err={}",
            Utc::now().to_rfc3339(),
            severity,
            ctx.format,
            ctx.filename,
            error
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::IngestionSeverity;
    use crate::error::IngestionError;

    #[test]
    fn io_errors_are_critical() {
        let err = IngestionError::Io(std::io::Error::other("disk gone"));
        assert_eq!(IngestionSeverity::for_error(&err), IngestionSeverity::Critical);
    }

    #[test]
    fn rejected_input_is_a_warning() {
        let err = IngestionError::UnsupportedFormat {
            filename: "a.pdf".to_string(),
        };
        assert_eq!(IngestionSeverity::for_error(&err), IngestionSeverity::Warning);
        assert!(IngestionSeverity::Warning < IngestionSeverity::Critical);
    }
}
