//! Cache configuration
//!
//! `CacheConfig` is the settable surface; `resolve()` turns it into an
//! immutable `ResolvedConfig` with a concrete cache directory. Build the
//! config once at startup and hand the resolved snapshot to the cache.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

/// Default freshness window in seconds
pub const DEFAULT_CACHE_AGE: u64 = 3600;

/// Default suffix for cache files
pub const DEFAULT_CACHE_EXTENSION: &str = ".api.cache";

/// Default connect timeout in seconds
pub const DEFAULT_HTTP_TIMEOUT: u64 = 5;

static DEFAULT_CACHE_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Errors that can occur when loading a config file
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid JSON for `CacheConfig`
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Settable cache configuration
///
/// Every field has a default, so a JSON config file only needs the fields it
/// changes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory for cache files; `None` uses the system temp directory
    pub cache_path: Option<PathBuf>,
    /// Seconds an entry stays fresh after it was written
    pub cache_age: u64,
    /// Suffix appended to every cache file name
    pub cache_extension: String,
    /// Prefix prepended to every cache file name
    pub cache_prefix: String,
    /// Skip TLS certificate and hostname verification
    pub ignore_https: bool,
    /// Connect timeout in seconds; zero for no limit
    pub http_timeout: u64,
    /// Overall request deadline in seconds; unset or zero for none
    pub request_timeout: Option<u64>,
    /// Cache and return empty response bodies instead of failing
    pub allow_empty_body: bool,
    /// Surface cache read errors other than a missing file
    pub strict_reads: bool,
    /// Serialize concurrent misses for the same key into one fetch
    pub coalesce_misses: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_path: None,
            cache_age: DEFAULT_CACHE_AGE,
            cache_extension: DEFAULT_CACHE_EXTENSION.to_string(),
            cache_prefix: String::new(),
            ignore_https: false,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            request_timeout: None,
            allow_empty_body: false,
            strict_reads: false,
            coalesce_misses: true,
        }
    }
}

impl CacheConfig {
    /// Loads a config from a JSON file, falling back to defaults for absent fields
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn with_cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_path = Some(path.into());
        self
    }

    pub fn with_cache_age(mut self, seconds: u64) -> Self {
        self.cache_age = seconds;
        self
    }

    pub fn with_cache_extension(mut self, extension: impl Into<String>) -> Self {
        self.cache_extension = extension.into();
        self
    }

    pub fn with_cache_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.cache_prefix = prefix.into();
        self
    }

    pub fn with_ignore_https(mut self, ignore: bool) -> Self {
        self.ignore_https = ignore;
        self
    }

    pub fn with_http_timeout(mut self, seconds: u64) -> Self {
        self.http_timeout = seconds;
        self
    }

    pub fn with_request_timeout(mut self, seconds: Option<u64>) -> Self {
        self.request_timeout = seconds;
        self
    }

    pub fn with_allow_empty_body(mut self, allow: bool) -> Self {
        self.allow_empty_body = allow;
        self
    }

    pub fn with_strict_reads(mut self, strict: bool) -> Self {
        self.strict_reads = strict;
        self
    }

    pub fn with_coalesce_misses(mut self, coalesce: bool) -> Self {
        self.coalesce_misses = coalesce;
        self
    }

    /// Freezes the config into a snapshot with a concrete cache directory
    ///
    /// An unset `cache_path` resolves to the system temp directory. That lookup
    /// happens at most once per process; later resolutions reuse it.
    pub fn resolve(self) -> ResolvedConfig {
        let cache_dir = match self.cache_path {
            Some(path) => path,
            None => DEFAULT_CACHE_DIR.get_or_init(std::env::temp_dir).clone(),
        };

        ResolvedConfig {
            cache_dir,
            cache_age: Duration::from_secs(self.cache_age),
            cache_extension: self.cache_extension,
            cache_prefix: self.cache_prefix,
            ignore_https: self.ignore_https,
            http_timeout: Duration::from_secs(self.http_timeout),
            request_timeout: self.request_timeout.map(Duration::from_secs),
            allow_empty_body: self.allow_empty_body,
            strict_reads: self.strict_reads,
            coalesce_misses: self.coalesce_misses,
        }
    }
}

/// Immutable configuration snapshot used for the lifetime of a cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub cache_dir: PathBuf,
    pub cache_age: Duration,
    pub cache_extension: String,
    pub cache_prefix: String,
    pub ignore_https: bool,
    pub http_timeout: Duration,
    pub request_timeout: Option<Duration>,
    pub allow_empty_body: bool,
    pub strict_reads: bool,
    pub coalesce_misses: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = CacheConfig::default();
        assert!(config.cache_path.is_none());
        assert_eq!(config.cache_age, 3600);
        assert_eq!(config.cache_extension, ".api.cache");
        assert_eq!(config.cache_prefix, "");
        assert!(!config.ignore_https);
        assert_eq!(config.http_timeout, 5);
        assert!(config.request_timeout.is_none());
        assert!(!config.allow_empty_body);
        assert!(!config.strict_reads);
        assert!(config.coalesce_misses);
    }

    #[test]
    fn test_unset_path_resolves_to_temp_dir() {
        let resolved = CacheConfig::default().resolve();
        assert_eq!(resolved.cache_dir, std::env::temp_dir());
    }

    #[test]
    fn test_default_dir_is_memoized() {
        let first = CacheConfig::default().resolve();
        let second = CacheConfig::default().resolve();
        assert_eq!(first.cache_dir, second.cache_dir);
    }

    #[test]
    fn test_explicit_path_wins() {
        let resolved = CacheConfig::default()
            .with_cache_path("/var/cache/apicache")
            .resolve();
        assert_eq!(resolved.cache_dir, PathBuf::from("/var/cache/apicache"));
    }

    #[test]
    fn test_resolve_converts_seconds() {
        let resolved = CacheConfig::default()
            .with_cache_age(2)
            .with_http_timeout(7)
            .with_request_timeout(Some(30))
            .resolve();
        assert_eq!(resolved.cache_age, Duration::from_secs(2));
        assert_eq!(resolved.http_timeout, Duration::from_secs(7));
        assert_eq!(resolved.request_timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_from_json_file_fills_missing_fields() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("config.json");
        fs::write(
            &path,
            r#"{ "cache_age": 60, "cache_prefix": "svc_", "ignore_https": true }"#,
        )
        .expect("Should write config");

        let config = CacheConfig::from_json_file(&path).expect("Should parse config");

        assert_eq!(config.cache_age, 60);
        assert_eq!(config.cache_prefix, "svc_");
        assert!(config.ignore_https);
        assert_eq!(config.cache_extension, ".api.cache");
        assert_eq!(config.http_timeout, 5);
    }

    #[test]
    fn test_from_json_file_missing_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let result = CacheConfig::from_json_file(&temp_dir.path().join("absent.json"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_from_json_file_invalid_json() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("config.json");
        fs::write(&path, "{ cache_age: ").expect("Should write config");

        let result = CacheConfig::from_json_file(&path);
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }
}
