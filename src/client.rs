//! Read-through cache client
//!
//! `ApiCache` ties the pieces together: derive the key, return a fresh entry
//! if the store has one, otherwise fetch live, persist the body, and return it.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, warn};

use crate::cache::{CacheError, CacheKey, CacheStore, KeyLocks};
use crate::config::{CacheConfig, ConfigError, ResolvedConfig};
use crate::fetch::{Fetch, FetchError, HttpFetcher};

/// Errors returned to callers of the cache
#[derive(Debug, Error)]
pub enum ApiCacheError {
    /// The live fetch failed; nothing was cached
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// A cache read failed in strict mode
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// The configuration could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Where a returned body came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    /// Served from a fresh cache entry
    Cache { cached_at: DateTime<Utc> },
    /// Fetched live on a miss
    Network,
}

/// A body together with how it was obtained
#[derive(Debug)]
pub struct CachedResponse {
    pub body: Vec<u8>,
    pub origin: Origin,
    /// Set when a live body could not be persisted; the body is still valid
    pub persist_error: Option<CacheError>,
}

impl CachedResponse {
    /// Whether the body was served from the cache
    pub fn is_hit(&self) -> bool {
        matches!(self.origin, Origin::Cache { .. })
    }
}

/// Read-through cache for HTTP GET requests
///
/// # Example
///
/// ```no_run
/// use apicache::{ApiCache, CacheConfig};
///
/// # async fn example() -> Result<(), apicache::ApiCacheError> {
/// let cache = ApiCache::new(CacheConfig::default().with_cache_age(600))?;
/// let body = cache.get_request("https://example.com/api/items", "").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ApiCache<F = HttpFetcher> {
    config: ResolvedConfig,
    store: CacheStore,
    fetcher: F,
    locks: KeyLocks,
}

impl ApiCache<HttpFetcher> {
    /// Creates a cache that fetches over HTTP using the configured client settings
    pub fn new(config: CacheConfig) -> Result<Self, ApiCacheError> {
        let config = config.resolve();
        let fetcher = HttpFetcher::from_config(&config)?;
        Ok(Self::from_parts(config, fetcher))
    }
}

impl<F: Fetch> ApiCache<F> {
    /// Creates a cache around a custom fetcher
    pub fn with_fetcher(config: CacheConfig, fetcher: F) -> Self {
        Self::from_parts(config.resolve(), fetcher)
    }

    fn from_parts(config: ResolvedConfig, fetcher: F) -> Self {
        debug!(cache_dir = %config.cache_dir.display(), "Cache directory resolved");
        Self {
            store: CacheStore::new(&config),
            config,
            fetcher,
            locks: KeyLocks::new(),
        }
    }

    /// The configuration snapshot this cache runs with
    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    /// The underlying disk store
    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    /// Returns the body for `url`, from the cache when fresh or live otherwise
    ///
    /// `name` separates cache entries for the same URL; pass `""` when not needed.
    /// A body that was fetched but could not be persisted is still returned.
    ///
    /// # Returns
    /// * `Ok(Vec<u8>)` - The response body
    /// * `Err(ApiCacheError::Fetch)` - On a miss, if the live fetch failed
    /// * `Err(ApiCacheError::Cache)` - In strict mode, if the entry could not be read
    pub async fn get_request(&self, url: &str, name: &str) -> Result<Vec<u8>, ApiCacheError> {
        self.get_response(url, name)
            .await
            .map(|response| response.body)
    }

    /// Like [`get_request`](Self::get_request), also reporting where the body
    /// came from and whether persisting it failed
    pub async fn get_response(
        &self,
        url: &str,
        name: &str,
    ) -> Result<CachedResponse, ApiCacheError> {
        let key = CacheKey::derive(url, name);

        if let Some(hit) = self.lookup(&key)? {
            debug!(url, key = %key, "Cache hit");
            return Ok(hit);
        }

        if !self.config.coalesce_misses {
            return self.fetch_and_store(url, &key).await;
        }

        let _guard = self.locks.acquire(&key).await;
        // Another caller may have filled the entry while we waited
        if let Some(hit) = self.lookup(&key)? {
            debug!(url, key = %key, "Cache filled by concurrent request");
            return Ok(hit);
        }
        self.fetch_and_store(url, &key).await
    }

    fn lookup(&self, key: &CacheKey) -> Result<Option<CachedResponse>, CacheError> {
        let entry = if self.config.strict_reads {
            self.store.try_lookup(key)?
        } else {
            self.store.lookup(key)
        };

        Ok(entry.map(|cached| CachedResponse {
            body: cached.data,
            origin: Origin::Cache {
                cached_at: cached.cached_at,
            },
            persist_error: None,
        }))
    }

    async fn fetch_and_store(
        &self,
        url: &str,
        key: &CacheKey,
    ) -> Result<CachedResponse, ApiCacheError> {
        debug!(url, key = %key, "Cache miss, fetching live");
        let body = self.fetcher.fetch(url).await?;

        if body.is_empty() && !self.config.allow_empty_body {
            return Err(FetchError::EmptyBody {
                url: url.to_string(),
            }
            .into());
        }

        let persist_error = match self.store.store(key, &body) {
            Ok(_) => None,
            Err(e) => {
                warn!(url, error = %e, "Failed to persist fetched response");
                Some(e)
            }
        };

        Ok(CachedResponse {
            body,
            origin: Origin::Network,
            persist_error,
        })
    }
}
