//! Live HTTP retrieval
//!
//! The `Fetch` trait is the seam between the cache and the network. The
//! production implementation is `HttpFetcher`, a thin wrapper around a
//! configured reqwest client.

use reqwest::{redirect, Client};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ResolvedConfig;

/// User agent sent with every live request
pub const USER_AGENT: &str = concat!("apicache/", env!("CARGO_PKG_VERSION"));

/// Redirects followed before a request fails
pub const MAX_REDIRECTS: usize = 10;

/// Errors that can occur when fetching a URL
#[derive(Debug, Error)]
pub enum FetchError {
    /// The HTTP client could not be built
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// Network, DNS, TLS or timeout failure
    #[error("HTTP request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-success status
    #[error("HTTP {status} fetching {url}")]
    Status { url: String, status: u16 },

    /// The server answered with an empty body and empty bodies are not accepted
    #[error("Empty response body from {url}")]
    EmptyBody { url: String },
}

/// Retrieves the body of a URL
pub trait Fetch: Send + Sync {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, FetchError>> + Send;
}

/// Fetcher backed by a reqwest client
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Creates a fetcher with a connect timeout and optional TLS bypass
    ///
    /// # Arguments
    /// * `connect_timeout` - How long to wait for the connection to open; zero means no limit
    /// * `ignore_tls_errors` - Disable certificate chain and hostname checks
    pub fn new(connect_timeout: Duration, ignore_tls_errors: bool) -> Result<Self, FetchError> {
        Self::build(connect_timeout, None, ignore_tls_errors)
    }

    /// Creates a fetcher from a resolved configuration
    pub fn from_config(config: &ResolvedConfig) -> Result<Self, FetchError> {
        Self::build(
            config.http_timeout,
            config.request_timeout,
            config.ignore_https,
        )
    }

    /// Creates a fetcher around an existing reqwest client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn build(
        connect_timeout: Duration,
        request_timeout: Option<Duration>,
        ignore_tls_errors: bool,
    ) -> Result<Self, FetchError> {
        let mut builder = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(redirect::Policy::limited(MAX_REDIRECTS));

        // Zero leaves the phase unbounded, as curl does
        if !connect_timeout.is_zero() {
            builder = builder.connect_timeout(connect_timeout);
        }
        if let Some(timeout) = request_timeout.filter(|t| !t.is_zero()) {
            builder = builder.timeout(timeout);
        }

        if ignore_tls_errors {
            warn!("TLS certificate and hostname verification disabled");
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder.build().map_err(FetchError::Client)?;
        Ok(Self { client })
    }
}

impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let request_error = |source| FetchError::Request {
            url: url.to_string(),
            source,
        };

        let response = self.client.get(url).send().await.map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(request_error)?;
        debug!(url, bytes = body.len(), "Fetched live response");
        Ok(body.to_vec())
    }
}
