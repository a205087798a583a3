//! Site identification: tries each registered adapter in priority order and
//! returns the first one claiming the series URL.

use std::sync::Arc;

use reqwest::Client;
use tracing::{debug, info, warn};

use crate::config::Settings;

use super::{GrabError, Inmanga, Mangadex, PlainHtml, Site, SiteContext, SiteError, Tcb};

/// Adapter chosen for a URL, with the probe errors raised by adapters tried
/// before it.
pub struct Identified {
    /// The adapter that claimed the URL.
    pub site: Arc<dyn Site>,
    /// Errors from earlier probes (a site may have been down).
    pub probe_errors: Vec<SiteError>,
}

impl std::fmt::Debug for Identified {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identified")
            .field("site", &self.site.name())
            .field("probe_errors", &self.probe_errors)
            .finish()
    }
}

/// Priority-ordered list of adapters for one series URL.
///
/// Adapters are tried in registration order; the first one whose
/// `validate_url` returns `Ok(true)` wins.
pub struct Grabber {
    url: String,
    sites: Vec<Arc<dyn Site>>,
}

impl Grabber {
    /// Creates a grabber with no adapters.
    ///
    /// # Errors
    ///
    /// Returns [`GrabError::InvalidUrl`] if `url` does not start with `http`.
    pub fn new(url: impl Into<String>) -> Result<Self, GrabError> {
        let url = url.into();
        if !url.starts_with("http") {
            return Err(GrabError::InvalidUrl { url });
        }
        Ok(Self {
            url,
            sites: Vec::new(),
        })
    }

    /// Creates a grabber with the built-in adapters, in priority order:
    /// plain HTML, InManga, MangaDex, TCB.
    ///
    /// # Errors
    ///
    /// Returns [`GrabError::InvalidUrl`] if `url` is not a parseable http(s) URL.
    pub fn with_default_sites(
        url: impl Into<String>,
        settings: Arc<Settings>,
        client: Client,
    ) -> Result<Self, GrabError> {
        let mut grabber = Self::new(url)?;
        let ctx = SiteContext::new(&grabber.url, settings, client).map_err(|error| {
            debug!(error = %error, "series URL rejected");
            GrabError::InvalidUrl {
                url: grabber.url.clone(),
            }
        })?;

        grabber.register(Arc::new(PlainHtml::new(ctx.clone())));
        grabber.register(Arc::new(Inmanga::new(ctx.clone())));
        grabber.register(Arc::new(Mangadex::new(ctx.clone())));
        grabber.register(Arc::new(Tcb::new(ctx)));
        Ok(grabber)
    }

    /// Appends an adapter at the lowest priority.
    pub fn register(&mut self, site: Arc<dyn Site>) {
        debug!(site = site.name(), "Registering site adapter");
        self.sites.push(site);
    }

    /// Series URL this grabber identifies.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the number of registered adapters.
    #[must_use]
    pub fn site_count(&self) -> usize {
        self.sites.len()
    }

    /// Returns true if no adapters are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    /// Returns the first adapter that claims the URL.
    ///
    /// Probe errors never stop the search; they are accumulated, logged and
    /// returned alongside the winner (or inside the error when none matches).
    ///
    /// # Errors
    ///
    /// Returns [`GrabError::SiteNotRecognized`] when no adapter claims the URL.
    #[tracing::instrument(skip(self), fields(url = %self.url))]
    pub async fn identify(&self) -> Result<Identified, GrabError> {
        let mut probe_errors = Vec::new();

        for site in &self.sites {
            debug!(site = site.name(), "Testing site");
            match site.validate_url().await {
                Ok(true) => {
                    info!(site = site.name(), "Site identified");
                    for error in &probe_errors {
                        warn!(error = %error, "error while testing sites");
                    }
                    return Ok(Identified {
                        site: Arc::clone(site),
                        probe_errors,
                    });
                }
                Ok(false) => {}
                Err(error) => {
                    debug!(site = site.name(), error = %error, "Site probe failed, trying next");
                    probe_errors.push(error);
                }
            }
        }

        Err(GrabError::SiteNotRecognized {
            url: self.url.clone(),
            errors: probe_errors,
        })
    }
}

impl std::fmt::Debug for Grabber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.sites.iter().map(|s| s.name()).collect();
        f.debug_struct("Grabber")
            .field("url", &self.url)
            .field("sites", &names)
            .finish()
    }
}
