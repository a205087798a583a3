//! Shared HTTP client construction and request helpers for site adapters.
//!
//! One client is built per run and shared by every adapter and by the page
//! fetcher, so connection pooling, timeouts and the User-Agent stay uniform.

use std::time::Duration;

use reqwest::header::REFERER;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::HttpTimeouts;
use crate::user_agent;

use super::SiteError;

/// Builds the HTTP client shared by a run.
///
/// # Errors
///
/// Returns the underlying [`reqwest::Error`] when the TLS backend or proxy
/// configuration cannot be initialised.
pub fn build_http_client(timeouts: HttpTimeouts) -> Result<Client, reqwest::Error> {
    Client::builder()
        .connect_timeout(Duration::from_secs(timeouts.connect_secs))
        .timeout(Duration::from_secs(timeouts.read_secs))
        .user_agent(user_agent::default_user_agent())
        .gzip(true)
        .build()
}

/// Request parameters shared by the GET/POST helpers.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Request<'a> {
    pub site: &'static str,
    pub url: &'a str,
    pub referer: Option<&'a str>,
}

impl<'a> Request<'a> {
    pub(crate) fn new(site: &'static str, url: &'a str) -> Self {
        Self {
            site,
            url,
            referer: None,
        }
    }

    pub(crate) fn referer(mut self, referer: &'a str) -> Self {
        self.referer = Some(referer);
        self
    }
}

async fn send(builder: RequestBuilder, request: Request<'_>) -> Result<reqwest::Response, SiteError> {
    let builder = match request.referer {
        Some(referer) => builder.header(REFERER, referer),
        None => builder,
    };

    let response = builder
        .send()
        .await
        .map_err(|e| SiteError::network(request.site, request.url, e))?;

    let status = response.status();
    if status != reqwest::StatusCode::OK {
        debug!(site = request.site, url = request.url, status = status.as_u16(), "non-200 response");
        return Err(SiteError::http_status(request.site, request.url, status.as_u16()));
    }

    Ok(response)
}

/// GETs `request.url` and returns the body as text.
pub(crate) async fn get_text(client: &Client, request: Request<'_>) -> Result<String, SiteError> {
    let response = send(client.get(request.url), request).await?;
    response
        .text()
        .await
        .map_err(|e| SiteError::network(request.site, request.url, e))
}

/// POSTs an empty body to `request.url` and returns the response text.
pub(crate) async fn post_text(client: &Client, request: Request<'_>) -> Result<String, SiteError> {
    let response = send(client.post(request.url), request).await?;
    response
        .text()
        .await
        .map_err(|e| SiteError::network(request.site, request.url, e))
}

/// GETs `request.url` and decodes the JSON body.
pub(crate) async fn get_json<T: DeserializeOwned>(
    client: &Client,
    request: Request<'_>,
) -> Result<T, SiteError> {
    let text = get_text(client, request).await?;
    serde_json::from_str(&text)
        .map_err(|e| SiteError::parse(request.site, request.url, format!("invalid JSON: {e}")))
}
