//! Site adapters turning a series URL into a title, a chapter list and, per
//! chapter, the page image URLs.
//!
//! # Architecture
//!
//! - [`Site`] - Async trait every adapter implements
//! - [`Grabber`] - Priority-ordered adapter list that picks the adapter for a URL
//! - [`SiteContext`] - Series URL, shared settings and HTTP client handed to adapters
//! - [`PlainHtml`] - Selector-driven scraping of plain HTML sites
//! - [`Inmanga`] - `inmanga.com` JSON feed adapter
//! - [`Mangadex`] - `mangadex.org` public API adapter
//! - [`Tcb`] - WordPress sites exposing `manga/<slug>/ajax/chapters`
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use manga_downloader::config::Settings;
//! use manga_downloader::site::{build_http_client, Grabber};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = Arc::new(Settings::default());
//! let client = build_http_client(settings.http)?;
//! let grabber = Grabber::with_default_sites("https://mangadex.org/title/x", settings, client)?;
//! let identified = grabber.identify().await?;
//! println!("{}", identified.site.fetch_title().await?);
//! # Ok(())
//! # }
//! ```

mod error;
mod grabber;
mod http;
mod inmanga;
mod mangadex;
mod plain_html;
mod tcb;
mod utils;

pub use error::{GrabError, SiteError};
pub use grabber::{Grabber, Identified};
pub use http::build_http_client;
pub use inmanga::Inmanga;
pub use mangadex::Mangadex;
pub use plain_html::PlainHtml;
pub use tcb::Tcb;

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use url::Url;

use crate::config::Settings;
use crate::models::{Chapter, ChapterEntry};

/// Everything an adapter needs to talk to its site.
///
/// Cloning is cheap: the settings are shared and the client is pooled.
#[derive(Debug, Clone)]
pub struct SiteContext {
    /// Series index URL as given by the user.
    pub url: Url,
    /// Read-only run settings.
    pub settings: Arc<Settings>,
    /// Shared HTTP client.
    pub client: Client,
}

impl SiteContext {
    /// Creates a context for `url`.
    ///
    /// # Errors
    ///
    /// Returns [`SiteError::InvalidUrl`] when `url` cannot be parsed.
    pub fn new(url: &str, settings: Arc<Settings>, client: Client) -> Result<Self, SiteError> {
        let url = Url::parse(url).map_err(|e| SiteError::invalid_url(url, e.to_string()))?;
        Ok(Self {
            url,
            settings,
            client,
        })
    }

    /// Returns `scheme://host[:port]` of the series URL.
    #[must_use]
    pub fn base_url(&self) -> String {
        utils::base_url(&self.url)
    }
}

/// A comic source.
///
/// Implementations may cache state discovered while validating (selectors,
/// listing rows, title); that state must be safe to read from concurrent
/// chapter tasks.
#[async_trait]
pub trait Site: Send + Sync {
    /// Short adapter name for logs and errors.
    fn name(&self) -> &'static str;

    /// Context the adapter was built with.
    fn context(&self) -> &SiteContext;

    /// `scheme://host` of the series URL, used as the `Referer` for images.
    fn base_url(&self) -> String {
        self.context().base_url()
    }

    /// Returns true if this adapter handles the series URL.
    ///
    /// May perform network requests.
    async fn validate_url(&self) -> Result<bool, SiteError>;

    /// Fetches the series title.
    async fn fetch_title(&self) -> Result<String, SiteError>;

    /// Lists the series chapters in site order.
    async fn fetch_chapters(&self) -> Result<Vec<ChapterEntry>, SiteError>;

    /// Resolves the pages of one listed chapter.
    async fn fetch_chapter(&self, entry: &ChapterEntry) -> Result<Chapter, SiteError>;
}
