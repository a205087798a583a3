//! Error types for page downloads and per-chapter pipeline failures.

use thiserror::Error;

use crate::packer::PackError;
use crate::site::SiteError;

/// Errors that can occur while fetching one page image.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The URL that failed to download.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout downloading {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// Any response other than 200 OK.
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The page URL is malformed.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// The run was cancelled before the page finished.
    #[error("download of {url} cancelled")]
    Cancelled {
        /// The URL that was being fetched.
        url: String,
    },
}

impl DownloadError {
    /// Creates a network error from a reqwest error, classifying timeouts.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            return Self::timeout(url);
        }
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates a cancellation error.
    pub fn cancelled(url: impl Into<String>) -> Self {
        Self::Cancelled { url: url.into() }
    }

    /// Returns true if the page was abandoned because the run was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// Reasons a chapter produced no output.
///
/// A chapter failure never aborts sibling chapters.
#[derive(Debug, Error)]
pub enum ChapterError {
    /// The site could not resolve the chapter's pages.
    #[error("chapter {chapter}: could not resolve pages: {source}")]
    Resolve {
        /// Chapter title.
        chapter: String,
        /// Adapter error.
        #[source]
        source: SiteError,
    },

    /// The chapter resolved to zero pages; nothing was fetched or written.
    #[error("chapter {chapter}: no pages found, skipping")]
    NoPages {
        /// Chapter title.
        chapter: String,
    },

    /// Every page fetch failed.
    #[error("chapter {chapter}: all {failed} pages failed to download")]
    AllPagesFailed {
        /// Chapter title.
        chapter: String,
        /// Number of failed pages.
        failed: usize,
    },

    /// The archive could not be written.
    #[error("chapter {chapter}: could not write archive: {source}")]
    Pack {
        /// Chapter title.
        chapter: String,
        /// Packer error.
        #[source]
        source: PackError,
    },

    /// The run was cancelled while the chapter was in flight.
    #[error("chapter {chapter}: cancelled")]
    Cancelled {
        /// Chapter title.
        chapter: String,
    },

    /// The chapter task panicked or was aborted.
    #[error("chapter {chapter}: task failed: {reason}")]
    TaskFailed {
        /// Chapter title.
        chapter: String,
        /// Join error description.
        reason: String,
    },
}

impl ChapterError {
    /// Returns true for failures caused by cancellation rather than the site.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}
