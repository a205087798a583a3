//! Run settings shared read-only by the grabber, the site adapters and the
//! fetch pipeline.
//!
//! Settings are assembled once by the CLI (flags over config file over
//! defaults) before any network I/O and then passed around as `Arc<Settings>`.

use std::path::PathBuf;

use tracing::warn;

/// Hard ceiling for concurrently downloaded chapters.
pub const MAX_CHAPTER_CONCURRENCY: u8 = 5;

/// Hard ceiling for concurrently downloaded pages within one chapter.
pub const MAX_PAGE_CONCURRENCY: u8 = 10;

/// Default filename template for produced archives.
pub const DEFAULT_FILENAME_TEMPLATE: &str = "{Series} {Number} - {Title}";

/// Chapter language the CLI asks for when none is configured.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Default HTTP connect timeout (30 seconds).
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default total request timeout (2 minutes).
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 120;

/// Per-stage concurrency ceilings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxConcurrency {
    /// Chapters downloaded at the same time.
    pub chapters: u8,
    /// Pages downloaded at the same time within one chapter.
    pub pages: u8,
}

impl MaxConcurrency {
    /// Creates ceilings clamped to `1..=MAX_CHAPTER_CONCURRENCY` and
    /// `1..=MAX_PAGE_CONCURRENCY`.
    ///
    /// Requests above the hard ceilings are lowered with a warning instead of
    /// being rejected.
    #[must_use]
    pub fn clamped(chapters: u8, pages: u8) -> Self {
        Self {
            chapters: clamp_stage("chapters", chapters, MAX_CHAPTER_CONCURRENCY),
            pages: clamp_stage("pages", pages, MAX_PAGE_CONCURRENCY),
        }
    }
}

impl Default for MaxConcurrency {
    fn default() -> Self {
        Self {
            chapters: MAX_CHAPTER_CONCURRENCY,
            pages: MAX_PAGE_CONCURRENCY,
        }
    }
}

fn clamp_stage(stage: &str, requested: u8, ceiling: u8) -> u8 {
    if requested > ceiling {
        warn!(stage, requested, ceiling, "concurrency above hard ceiling, lowering");
        return ceiling;
    }
    requested.max(1)
}

/// Timeouts applied to every outbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    /// Connect timeout in seconds.
    pub connect_secs: u64,
    /// Total request timeout in seconds (connect + transfer).
    pub read_secs: u64,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self {
            connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            read_secs: DEFAULT_READ_TIMEOUT_SECS,
        }
    }
}

/// Process-wide configuration for one run.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Pack every selected chapter into a single archive.
    pub bundle: bool,
    /// Concurrency ceilings for both pipeline stages.
    pub max_concurrency: MaxConcurrency,
    /// Preferred chapter language (adapter dependent, e.g. `en`, `es`).
    pub language: Option<String>,
    /// Archive filename template (`{Series}`, `{Number}`, `{Title}`).
    pub filename_template: String,
    /// Directory receiving the archives.
    pub output_dir: PathBuf,
    /// Request timeouts.
    pub http: HttpTimeouts,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bundle: false,
            max_concurrency: MaxConcurrency::default(),
            language: None,
            filename_template: DEFAULT_FILENAME_TEMPLATE.to_string(),
            output_dir: PathBuf::from("."),
            http: HttpTimeouts::default(),
        }
    }
}

impl Settings {
    /// Returns the preferred language, treating an empty string as unset.
    #[must_use]
    pub fn preferred_language(&self) -> Option<&str> {
        self.language
            .as_deref()
            .map(str::trim)
            .filter(|lang| !lang.is_empty())
    }
}
