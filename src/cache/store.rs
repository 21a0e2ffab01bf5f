//! Disk store for cached response bodies
//!
//! One flat directory, one file per key. The file content is the raw body and
//! the file modification time is the freshness timestamp, so the directory
//! itself is the index and other processes see new entries immediately.

use chrono::{DateTime, Utc};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::{Builder, NamedTempFile};
use thiserror::Error;
use tracing::debug;

use super::CacheKey;
use crate::config::{ResolvedConfig, DEFAULT_CACHE_EXTENSION};

/// Errors raised by the disk store
#[derive(Debug, Error)]
pub enum CacheError {
    /// A cache file exists but could not be read
    #[error("Failed to read cache file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A cache file could not be written
    #[error("Failed to write cache file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A fresh entry read from the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedData {
    /// The cached response body
    pub data: Vec<u8>,
    /// When the entry was last written
    pub cached_at: DateTime<Utc>,
}

/// Reads and writes cache files under a single directory
#[derive(Debug, Clone)]
pub struct CacheStore {
    /// Directory where cache files are stored
    cache_dir: PathBuf,
    prefix: String,
    extension: String,
    /// How long an entry stays fresh after it is written
    max_age: Duration,
}

impl CacheStore {
    /// Creates a store from a resolved configuration
    pub fn new(config: &ResolvedConfig) -> Self {
        Self {
            cache_dir: config.cache_dir.clone(),
            prefix: config.cache_prefix.clone(),
            extension: config.cache_extension.clone(),
            max_age: config.cache_age,
        }
    }

    /// Creates a store with a custom directory and the default file naming
    ///
    /// Useful for testing or when a specific cache location is needed.
    pub fn with_dir(cache_dir: PathBuf, max_age: Duration) -> Self {
        Self {
            cache_dir,
            prefix: String::new(),
            extension: DEFAULT_CACHE_EXTENSION.to_string(),
            max_age,
        }
    }

    /// Returns the directory this store writes to
    pub fn dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Returns the path of the cache file for the given key
    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.cache_dir
            .join(key.file_name(&self.prefix, &self.extension))
    }

    /// Ensures the cache directory exists
    fn ensure_dir(&self) -> io::Result<()> {
        fs::create_dir_all(&self.cache_dir)
    }

    /// Opens a temporary file in the cache directory
    ///
    /// On Unix the file is requested with mode `0o666`, so after the umask it ends
    /// up with the same permissions `fs::write` would give it and other users
    /// sharing the directory can read the entry.
    fn temp_file(&self) -> io::Result<NamedTempFile> {
        #[cfg_attr(not(unix), allow(unused_mut))]
        let mut builder = Builder::new();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            builder.permissions(fs::Permissions::from_mode(0o666));
        }
        builder.tempfile_in(&self.cache_dir)
    }

    /// Writes a payload for the given key, replacing any existing entry
    ///
    /// The payload goes to a temporary file in the cache directory which is then
    /// renamed over the target, so readers never see a partially written entry.
    /// The new file's modification time marks the entry fresh.
    ///
    /// # Returns
    /// * `Ok(PathBuf)` with the path of the written entry
    /// * `Err(CacheError::Write)` if the directory or file cannot be written
    pub fn store(&self, key: &CacheKey, payload: &[u8]) -> Result<PathBuf, CacheError> {
        let path = self.path_for(key);
        let write_error = |source| CacheError::Write {
            path: path.clone(),
            source,
        };

        self.ensure_dir().map_err(write_error)?;

        let mut file = self.temp_file().map_err(write_error)?;
        file.write_all(payload).map_err(write_error)?;
        file.persist(&path).map_err(|e| write_error(e.error))?;

        debug!(key = %key, bytes = payload.len(), path = %path.display(), "Stored cache entry");
        Ok(path)
    }

    /// Reads a fresh entry, treating every filesystem error as a miss
    ///
    /// Returns `None` if the entry is missing, stale or unreadable.
    pub fn lookup(&self, key: &CacheKey) -> Option<CachedData> {
        self.lookup_at(key, SystemTime::now())
    }

    /// Like [`lookup`](Self::lookup), judged against an explicit clock reading
    pub fn lookup_at(&self, key: &CacheKey, now: SystemTime) -> Option<CachedData> {
        match self.try_lookup_at(key, now) {
            Ok(entry) => entry,
            Err(e) => {
                debug!(key = %key, error = %e, "Unreadable cache entry treated as a miss");
                None
            }
        }
    }

    /// Reads a fresh entry, surfacing filesystem errors
    ///
    /// A missing or stale entry is `Ok(None)`; any other failure to stat or read
    /// the file is `Err(CacheError::Read)`.
    pub fn try_lookup(&self, key: &CacheKey) -> Result<Option<CachedData>, CacheError> {
        self.try_lookup_at(key, SystemTime::now())
    }

    /// Like [`try_lookup`](Self::try_lookup), judged against an explicit clock reading
    pub fn try_lookup_at(
        &self,
        key: &CacheKey,
        now: SystemTime,
    ) -> Result<Option<CachedData>, CacheError> {
        let path = self.path_for(key);
        let read_error = |source| CacheError::Read {
            path: path.clone(),
            source,
        };

        let modified = match fs::metadata(&path).and_then(|meta| meta.modified()) {
            Ok(modified) => modified,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(read_error(e)),
        };

        if !is_fresh(modified, self.max_age, now) {
            debug!(key = %key, "Cache entry is stale");
            return Ok(None);
        }

        let data = match fs::read(&path) {
            Ok(data) => data,
            // Removed between the stat and the read
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(read_error(e)),
        };

        Ok(Some(CachedData {
            data,
            cached_at: DateTime::<Utc>::from(modified),
        }))
    }
}

/// An entry is fresh while `modified + max_age >= now`
fn is_fresh(modified: SystemTime, max_age: Duration, now: SystemTime) -> bool {
    match modified.checked_add(max_age) {
        Some(expires_at) => expires_at >= now,
        None => true,
    }
}
