//! Command-line interface parsing for apicache
//!
//! This module handles parsing of CLI arguments using clap and layering the
//! flags over an optional JSON config file.

use std::path::PathBuf;

use clap::Parser;
use reqwest::Url;
use thiserror::Error;

use crate::config::{CacheConfig, ConfigError};

/// Error types for CLI argument handling
#[derive(Debug, Error)]
pub enum CliError {
    /// The URL argument is not an absolute http(s) URL
    #[error("Invalid URL: '{0}'. Expected an absolute http:// or https:// URL")]
    InvalidUrl(String),

    /// The config file could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// apicache - Fetch a URL through a read-through disk cache
#[derive(Parser, Debug)]
#[command(name = "apicache")]
#[command(about = "Fetch a URL through a read-through disk cache and print the body")]
#[command(version)]
pub struct Cli {
    /// URL to fetch
    pub url: String,

    /// Name separating cache entries for the same URL
    #[arg(long, default_value = "")]
    pub name: String,

    /// JSON config file; flags below override its values
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory for cache files (default: system temp directory)
    #[arg(long, value_name = "DIR")]
    pub cache_path: Option<PathBuf>,

    /// Seconds an entry stays fresh
    #[arg(long, value_name = "SECS")]
    pub cache_age: Option<u64>,

    /// Suffix for cache file names
    #[arg(long, value_name = "EXT")]
    pub extension: Option<String>,

    /// Prefix for cache file names
    #[arg(long, value_name = "PREFIX")]
    pub prefix: Option<String>,

    /// Connect timeout in seconds (0 for no limit)
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Overall request deadline in seconds (0 for none)
    #[arg(long, value_name = "SECS")]
    pub request_timeout: Option<u64>,

    /// Skip TLS certificate and hostname verification
    #[arg(long)]
    pub ignore_https: bool,

    /// Accept and cache empty response bodies
    #[arg(long)]
    pub allow_empty: bool,

    /// Fail on cache read errors instead of refetching
    #[arg(long)]
    pub strict: bool,

    /// Let concurrent misses for the same entry each fetch
    #[arg(long)]
    pub no_coalesce: bool,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

/// Checks that a URL argument is an absolute http(s) URL
pub fn parse_url_arg(s: &str) -> Result<Url, CliError> {
    let url = Url::parse(s).map_err(|_| CliError::InvalidUrl(s.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        _ => Err(CliError::InvalidUrl(s.to_string())),
    }
}

impl Cli {
    /// Builds the cache configuration from the config file and flags
    ///
    /// # Returns
    /// * `Ok(CacheConfig)` with flags applied over the file (or defaults)
    /// * `Err(CliError::Config)` if the config file cannot be loaded
    pub fn cache_config(&self) -> Result<CacheConfig, CliError> {
        let mut config = match &self.config {
            Some(path) => CacheConfig::from_json_file(path)?,
            None => CacheConfig::default(),
        };

        if let Some(path) = &self.cache_path {
            config = config.with_cache_path(path);
        }
        if let Some(age) = self.cache_age {
            config = config.with_cache_age(age);
        }
        if let Some(extension) = &self.extension {
            config = config.with_cache_extension(extension);
        }
        if let Some(prefix) = &self.prefix {
            config = config.with_cache_prefix(prefix);
        }
        if let Some(timeout) = self.timeout {
            config = config.with_http_timeout(timeout);
        }
        if let Some(timeout) = self.request_timeout {
            config = config.with_request_timeout(Some(timeout));
        }
        // Switches only move away from the defaults
        if self.ignore_https {
            config = config.with_ignore_https(true);
        }
        if self.allow_empty {
            config = config.with_allow_empty_body(true);
        }
        if self.strict {
            config = config.with_strict_reads(true);
        }
        if self.no_coalesce {
            config = config.with_coalesce_misses(false);
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_parse_url_arg_accepts_http_and_https() {
        assert!(parse_url_arg("http://example.com/a").is_ok());
        assert!(parse_url_arg("https://example.com/a?b=c").is_ok());
    }

    #[test]
    fn test_parse_url_arg_rejects_other_schemes() {
        let err = parse_url_arg("ftp://example.com/a").unwrap_err();
        assert!(err.to_string().contains("Invalid URL"));
        assert!(err.to_string().contains("ftp://example.com/a"));
    }

    #[test]
    fn test_parse_url_arg_rejects_relative() {
        assert!(parse_url_arg("example.com/a").is_err());
    }

    #[test]
    fn test_cli_parse_url_only() {
        let cli = Cli::parse_from(["apicache", "http://x/a"]);
        assert_eq!(cli.url, "http://x/a");
        assert_eq!(cli.name, "");
        assert!(!cli.debug);
    }

    #[test]
    fn test_cli_requires_url() {
        assert!(Cli::try_parse_from(["apicache"]).is_err());
    }

    #[test]
    fn test_cache_config_defaults_without_flags() {
        let cli = Cli::parse_from(["apicache", "http://x/a"]);
        let config = cli.cache_config().unwrap();
        assert_eq!(config, CacheConfig::default());
    }

    #[test]
    fn test_cache_config_applies_flags() {
        let cli = Cli::parse_from([
            "apicache",
            "http://x/a",
            "--name",
            "list",
            "--cache-path",
            "/tmp/apicache-test",
            "--cache-age",
            "60",
            "--extension",
            ".json",
            "--prefix",
            "svc_",
            "--timeout",
            "9",
            "--request-timeout",
            "30",
            "--ignore-https",
            "--allow-empty",
            "--strict",
            "--no-coalesce",
        ]);
        let config = cli.cache_config().unwrap();

        assert_eq!(cli.name, "list");
        assert_eq!(config.cache_path, Some(PathBuf::from("/tmp/apicache-test")));
        assert_eq!(config.cache_age, 60);
        assert_eq!(config.cache_extension, ".json");
        assert_eq!(config.cache_prefix, "svc_");
        assert_eq!(config.http_timeout, 9);
        assert!(config.ignore_https);
        assert!(config.allow_empty_body);
        assert!(config.strict_reads);
        assert_eq!(config.request_timeout, Some(30));
        assert!(!config.coalesce_misses);
    }

    #[test]
    fn test_request_timeout_flag_overrides_config_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("apicache.json");
        fs::write(&path, r#"{ "request_timeout": 5, "coalesce_misses": true }"#).unwrap();
        let path_arg = path.to_string_lossy().into_owned();

        let cli = Cli::parse_from([
            "apicache",
            "http://x/a",
            "--config",
            path_arg.as_str(),
            "--request-timeout",
            "0",
            "--no-coalesce",
        ]);
        let config = cli.cache_config().unwrap();

        assert_eq!(config.request_timeout, Some(0));
        assert!(!config.coalesce_misses);
    }

    #[test]
    fn test_flags_override_config_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("apicache.json");
        fs::write(&path, r#"{ "cache_age": 10, "cache_prefix": "file_" }"#).unwrap();
        let path_arg = path.to_string_lossy().into_owned();

        let cli = Cli::parse_from(["apicache", "http://x/a", "--config", path_arg.as_str(), "--cache-age", "20"]);
        let config = cli.cache_config().unwrap();

        assert_eq!(config.cache_age, 20);
        assert_eq!(config.cache_prefix, "file_");
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let cli = Cli::parse_from(["apicache", "http://x/a", "--config", "/nonexistent/apicache.json"]);
        assert!(matches!(cli.cache_config(), Err(CliError::Config(_))));
    }
}
