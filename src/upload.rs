//! Upload staging.
//!
//! An upload is checked against an [`UploadPolicy`] and streamed to a temp file in the data
//! directory. The returned [`StagedUpload`] owns that file and deletes it when dropped, so the
//! temp file never outlives the ingest call whether it succeeds or fails.

use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use tracing::warn;
use uuid::Uuid;

use crate::config::StoreConfig;
use crate::error::{IngestionError, IngestionResult};
use crate::ingestion::IngestionFormat;

/// Limits applied before an upload reaches the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPolicy {
    /// Largest accepted upload, in bytes.
    pub max_bytes: u64,
    /// Accepted extensions, lower-case and without the dot.
    pub allowed_extensions: Vec<String>,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self::from_config(&StoreConfig::default())
    }
}

impl UploadPolicy {
    pub fn from_config(config: &StoreConfig) -> Self {
        Self {
            max_bytes: config.max_upload_bytes,
            allowed_extensions: IngestionFormat::EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect(),
        }
    }

    /// `Ok` when `filename` ends in an allowed extension (case-insensitive).
    pub fn check_filename(&self, filename: &str) -> IngestionResult<()> {
        let ext = Path::new(filename)
            .extension()
            .and_then(|s| s.to_str())
            .map(str::to_ascii_lowercase);
        match ext {
            Some(ext) if self.allowed_extensions.iter().any(|a| *a == ext) => Ok(()),
            _ => Err(IngestionError::UnsupportedFormat {
                filename: filename.to_string(),
            }),
        }
    }
}

/// A temp file holding an upload. Deleted on drop.
#[derive(Debug)]
pub struct StagedUpload {
    path: PathBuf,
    bytes: u64,
}

impl StagedUpload {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size of the staged file in bytes.
    pub fn len(&self) -> u64 {
        self.bytes
    }

    pub fn is_empty(&self) -> bool {
        self.bytes == 0
    }
}

impl Drop for StagedUpload {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "failed to remove staged upload");
            }
        }
    }
}

/// Check `filename` against `policy`, then stream `reader` into `temp_<uuid>_<basename>` under
/// `dir`.
///
/// Fails with `UnsupportedFormat` before reading anything, and with `PayloadTooLarge` as soon
/// as more than `policy.max_bytes` have been read.
pub fn stage_upload<R: Read>(
    reader: R,
    filename: &str,
    dir: &Path,
    policy: &UploadPolicy,
) -> IngestionResult<StagedUpload> {
    policy.check_filename(filename)?;
    fs::create_dir_all(dir)?;

    let basename = Path::new(filename)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("upload");
    // The guard exists before the first byte is written, so every early return cleans up.
    let mut staged = StagedUpload {
        path: dir.join(format!("temp_{}_{basename}", Uuid::new_v4())),
        bytes: 0,
    };

    let mut out = BufWriter::new(File::create(&staged.path)?);
    let mut limited = reader.take(policy.max_bytes.saturating_add(1));
    let copied = io::copy(&mut limited, &mut out)?;
    if copied > policy.max_bytes {
        return Err(IngestionError::PayloadTooLarge {
            limit: policy.max_bytes,
        });
    }
    out.flush()?;
    staged.bytes = copied;
    Ok(staged)
}
