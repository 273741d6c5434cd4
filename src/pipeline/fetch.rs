//! HTTP fetch of source pages.
//!
//! [`PageFetcher`] is the seam between extraction and the network: the
//! extractor only needs "URL in, markup out, or a status-carrying error".
//! [`HttpFetcher`] is the production implementation on top of a single
//! `reqwest::Client` built once per [`crate::Forge`].

use crate::error::ExtractionError;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Fetch raw markup for a URL.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<String, ExtractionError>;
}

/// `reqwest`-backed [`PageFetcher`].
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout_secs: u64,
    max_bytes: usize,
}

impl HttpFetcher {
    /// Build a fetcher with the given timeout, body-size cap and User-Agent.
    pub fn new(timeout_secs: u64, max_bytes: usize, user_agent: &str) -> Result<Self, reqwest::Error> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(timeout_secs.min(10)))
            .timeout(Duration::from_secs(timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(10))
            .user_agent(user_agent)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            timeout_secs,
            max_bytes,
        })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<String, ExtractionError> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ExtractionError::InvalidUrl {
                url: url.to_string(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }

        debug!("Fetching source page: {}", url);
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| ExtractionError::from_reqwest(url.as_str(), e, self.timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExtractionError::Fetch {
                url: url.to_string(),
                status: Some(status.as_u16()),
                reason: format!("HTTP {status}"),
            });
        }

        if let Some(len) = response.content_length() {
            if len as usize > self.max_bytes {
                return Err(too_large(url, len as usize, self.max_bytes));
            }
        }

        let body = response
            .text()
            .await
            .map_err(|e| ExtractionError::from_reqwest(url.as_str(), e, self.timeout_secs))?;
        if body.len() > self.max_bytes {
            return Err(too_large(url, body.len(), self.max_bytes));
        }

        debug!("Fetched {} bytes from {}", body.len(), url);
        Ok(body)
    }
}

fn too_large(url: &Url, len: usize, max: usize) -> ExtractionError {
    ExtractionError::Fetch {
        url: url.to_string(),
        status: None,
        reason: format!("page is {len} bytes, limit is {max}"),
    }
}
