//! Error types for site adapters and site identification.

use thiserror::Error;

/// Errors raised by a site adapter.
#[derive(Debug, Error)]
pub enum SiteError {
    /// The series URL cannot be parsed.
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl {
        /// The offending URL.
        url: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Network-level failure (DNS, connect, TLS, timeout).
    #[error("[{site}] network error requesting {url}: {source}")]
    Network {
        /// Adapter name.
        site: &'static str,
        /// Requested URL.
        url: String,
        /// Underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// Non-success HTTP status.
    #[error("[{site}] HTTP {status} requesting {url}")]
    HttpStatus {
        /// Adapter name.
        site: &'static str,
        /// Requested URL.
        url: String,
        /// Response status code.
        status: u16,
    },

    /// The response did not have the expected structure.
    #[error("[{site}] unexpected response from {url}: {reason}")]
    Parse {
        /// Adapter name.
        site: &'static str,
        /// Requested URL.
        url: String,
        /// What was missing or malformed.
        reason: String,
    },

    /// A chapter handle produced by another adapter was passed in.
    #[error("[{site}] cannot resolve chapter '{chapter}': unsupported chapter handle")]
    UnsupportedChapter {
        /// Adapter name.
        site: &'static str,
        /// Chapter title.
        chapter: String,
    },
}

impl SiteError {
    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates a network error.
    pub fn network(site: &'static str, url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            site,
            url: url.into(),
            source,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(site: &'static str, url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            site,
            url: url.into(),
            status,
        }
    }

    /// Creates a parse error.
    pub fn parse(site: &'static str, url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Parse {
            site,
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates an unsupported chapter error.
    pub fn unsupported_chapter(site: &'static str, chapter: impl Into<String>) -> Self {
        Self::UnsupportedChapter {
            site,
            chapter: chapter.into(),
        }
    }
}

/// Errors raised while picking the adapter for a URL.
#[derive(Debug, Error)]
pub enum GrabError {
    /// The URL is not an http(s) URL.
    #[error("invalid url '{url}'\n  Suggestion: Pass the http(s) URL of the series index page")]
    InvalidUrl {
        /// The offending input.
        url: String,
    },

    /// No adapter claimed the URL.
    #[error("site not recognised for '{url}'{}", format_probe_errors(.errors))]
    SiteNotRecognized {
        /// The series URL.
        url: String,
        /// Errors accumulated while probing adapters.
        errors: Vec<SiteError>,
    },
}

fn format_probe_errors(errors: &[SiteError]) -> String {
    if errors.is_empty() {
        return String::new();
    }
    let joined: Vec<String> = errors.iter().map(ToString::to_string).collect();
    format!(" (errors testing sites, a site may be down: {})", joined.join(", "))
}
