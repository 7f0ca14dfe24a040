//! Store configuration.
//!
//! Use [`StoreConfig::default`] for local runs, or [`StoreConfig::from_env`] to read the
//! deployment settings:
//!
//! | variable | field | default |
//! |---|---|---|
//! | `UPLOAD_DIR` | `data_dir` | `./uploads` |
//! | `MAX_FILE_SIZE_MB` | `max_upload_bytes` | 50 MiB |
//! | `TABLE_CACHE_CAPACITY` | `cache_capacity` | 64 |
//! | `PARSE_DATES` | `parse_dates` | `false` |

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{IngestionError, IngestionResult};

const MIB: u64 = 1024 * 1024;

/// Settings for a [`crate::store::TableStore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding the durable table and metadata files (and staged uploads).
    pub data_dir: PathBuf,
    /// Maximum number of tables kept in the memory cache.
    pub cache_capacity: usize,
    /// Largest accepted upload, in bytes.
    pub max_upload_bytes: u64,
    /// Detect ISO dates/datetimes in delimited text.
    pub parse_dates: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./uploads"),
            cache_capacity: 64,
            max_upload_bytes: 50 * MIB,
            parse_dates: false,
        }
    }
}

impl StoreConfig {
    /// Build a config from environment variables, falling back to the defaults.
    pub fn from_env() -> IngestionResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> IngestionResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(dir) = lookup("UPLOAD_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(mb) = lookup("MAX_FILE_SIZE_MB") {
            config.max_upload_bytes = parse_number::<u64>("MAX_FILE_SIZE_MB", &mb)? * MIB;
        }
        if let Some(cap) = lookup("TABLE_CACHE_CAPACITY") {
            config.cache_capacity = parse_number("TABLE_CACHE_CAPACITY", &cap)?;
        }
        if let Some(flag) = lookup("PARSE_DATES") {
            config.parse_dates = match flag.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" | "" => false,
                other => {
                    return Err(IngestionError::Config {
                        message: format!("PARSE_DATES: expected a boolean, got '{other}'"),
                    });
                }
            };
        }
        if config.cache_capacity == 0 {
            return Err(IngestionError::Config {
                message: "TABLE_CACHE_CAPACITY must be at least 1".to_string(),
            });
        }
        Ok(config)
    }

    /// Use `dir` as the data directory.
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    /// Use `capacity` as the memory cache capacity.
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> IngestionResult<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|e| IngestionError::Config {
        message: format!("{key}: {e} (raw='{raw}')"),
    })
}
