//! apicache - a transparent read-through disk cache for HTTP(S) GET requests
//!
//! Bodies are stored one file per request under a single directory, named by
//! a hash of the URL and an optional name, and served from disk until their
//! modification time is older than the configured cache age.

pub mod cache;
pub mod cli;
pub mod client;
pub mod config;
pub mod fetch;

pub use cache::{CacheError, CacheKey, CacheStore, CachedData};
pub use client::{ApiCache, ApiCacheError, CachedResponse, Origin};
pub use config::{CacheConfig, ConfigError, ResolvedConfig};
pub use fetch::{Fetch, FetchError, HttpFetcher};
