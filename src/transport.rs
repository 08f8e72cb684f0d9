//! HTTP transport seam.
//!
//! The pipeline talks to the network through the [`Fetch`] trait so hosts
//! can substitute their own transport (and tests can substitute canned
//! responses). [`HttpFetcher`] is the default implementation over a tuned
//! `reqwest` client.
//!
//! No retry, no cache, no timeout policy beyond the client's own limits —
//! a single request/response cycle per call.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, instrument};

/// Transport-layer failures.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Failure reported by a non-HTTP transport implementation.
    #[error("{0}")]
    Other(String),
}

/// A single-shot fetch of a URL's body.
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Fetch `url` and return the response body as text.
    ///
    /// Non-success HTTP statuses are errors.
    async fn fetch(&self, url: &str) -> Result<String, TransportError>;
}

/// Default [`Fetch`] implementation over `reqwest`.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Create a fetcher with connection pooling, compression, and timeouts.
    pub fn new() -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            // TLS via rustls
            .use_rustls_tls()
            // Compression (auto-negotiated via Accept-Encoding)
            .brotli(true)
            .zstd(true)
            .gzip(true)
            .deflate(true)
            // Connection reuse
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .tcp_nodelay(true)
            // Timeouts
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;

        Ok(Self { client })
    }

    /// Wrap an already-configured `reqwest` client.
    #[must_use]
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    #[instrument(skip(self), fields(url = %url))]
    async fn fetch(&self, url: &str) -> Result<String, TransportError> {
        let response = self.client.get(url).send().await?;

        debug!(
            status = %response.status(),
            version = ?response.version(),
            "Response received"
        );

        let response = response.error_for_status()?;
        Ok(response.text().await?)
    }
}
