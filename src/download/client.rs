//! Page image fetching.
//!
//! The pipeline talks to a [`PageFetcher`] so tests can substitute latency,
//! failures and in-flight accounting without a network.

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::REFERER;
use tracing::{debug, instrument};
use url::Url;

use crate::models::Page;

use super::DownloadError;

/// Fetches the raw bytes of one page image.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Performs one fetch of `page`, sending `referer` when given.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError`] on network failures and any non-200 status.
    async fn fetch(&self, page: &Page, referer: Option<&str>) -> Result<Vec<u8>, DownloadError>;
}

/// HTTP page fetcher sharing the run's pooled client.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Wraps an already configured client (timeouts, User-Agent, gzip).
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageFetcher for HttpClient {
    #[instrument(level = "debug", skip(self, page), fields(page = page.number, url = %page.url))]
    async fn fetch(&self, page: &Page, referer: Option<&str>) -> Result<Vec<u8>, DownloadError> {
        let url = Url::parse(&page.url).map_err(|_| DownloadError::invalid_url(&page.url))?;

        let mut request = self.client.get(url);
        if let Some(referer) = referer {
            request = request.header(REFERER, referer);
        }

        let response = request
            .send()
            .await
            .map_err(|e| DownloadError::network(&page.url, e))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(DownloadError::http_status(&page.url, status.as_u16()));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| DownloadError::network(&page.url, e))?;
        debug!(bytes = bytes.len(), "page fetched");
        Ok(bytes.to_vec())
    }
}
