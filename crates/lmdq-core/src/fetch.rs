//! Retrieval of feed aggregates and the discovery feed.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use tracing::{debug, warn};

use crate::error::FetchError;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    /// Whole-request timeout, body included.
    pub timeout: Duration,
    /// Accept any TLS certificate. Trust then rests on the signature check
    /// alone.
    pub insecure_transport: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            insecure_transport: false,
        }
    }
}

/// Somewhere feed bytes come from.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch the full body at `url`. Anything but a 2xx response is an error.
    async fn fetch(&self, url: &str) -> Result<Bytes, FetchError>;
}

/// Fetches over HTTP(S) with one shared connection pool.
#[derive(Debug, Clone)]
pub struct HttpFeedSource {
    client: Client,
    timeout: Duration,
}

impl HttpFeedSource {
    /// # Errors
    ///
    /// Returns [`FetchError::Client`] if the TLS backend cannot be initialised.
    pub fn new(options: &FetchOptions) -> Result<Self, FetchError> {
        let mut builder = Client::builder()
            .user_agent(crate::USER_AGENT)
            .timeout(options.timeout);
        if options.insecure_transport {
            warn!("TLS certificate verification is disabled for feed fetches");
            builder = builder.danger_accept_invalid_certs(true);
        }
        Ok(Self {
            client: builder.build().map_err(FetchError::Client)?,
            timeout: options.timeout,
        })
    }

    fn transport_error(&self, url: &str, source: reqwest::Error) -> FetchError {
        if source.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
                timeout: self.timeout,
            }
        } else {
            FetchError::Transport {
                url: url.to_string(),
                source,
            }
        }
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn fetch(&self, url: &str) -> Result<Bytes, FetchError> {
        debug!("GET {url}");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.transport_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(url, e))?;
        debug!("Fetched {} bytes from {url}", body.len());
        Ok(body)
    }
}
