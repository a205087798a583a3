//! One download run: identify the site, read the series, select chapters and
//! hand them to the fetch pipeline.

use std::sync::Arc;

use reqwest::Client;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::config::Settings;
use crate::download::{FetchPipeline, HttpClient, PageFetcher, PipelineReport, ProgressSink};
use crate::filter::{filter_ranges, sort_by_number};
use crate::models::{ChapterEntry, Filterable};
use crate::packer::format_chapter_number;
use crate::ranges::{Range, RangeError, parse_ranges};
use crate::site::{GrabError, Grabber, Site, SiteError};

/// Failures that stop a run before any chapter is downloaded.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No adapter claimed the URL, or the URL is not http(s).
    #[error(transparent)]
    Grab(#[from] GrabError),

    /// The series title could not be fetched.
    #[error("could not fetch the series title from {site}: {source}")]
    Title {
        /// Adapter name.
        site: &'static str,
        /// Underlying error.
        #[source]
        source: SiteError,
    },

    /// The chapter list could not be fetched.
    #[error("could not fetch the chapter list from {site}: {source}")]
    Chapters {
        /// Adapter name.
        site: &'static str,
        /// Underlying error.
        #[source]
        source: SiteError,
    },
}

/// Chapters picked for download.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    /// Selected chapters, ascending by number, each at most once.
    pub chapters: Vec<ChapterEntry>,
    /// Ranges that were applied; empty when every chapter was selected.
    pub ranges: Vec<Range>,
    /// Malformed range tokens that were ignored.
    pub skipped: Vec<RangeError>,
}

impl Selection {
    /// Returns true if no chapter was selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chapters.is_empty()
    }

    /// Number of selected chapters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.chapters.len()
    }

    /// Label used as `{Number}` for bundles: the applied ranges joined by
    /// commas, or `first-last` when every chapter was selected.
    #[must_use]
    pub fn range_label(&self) -> String {
        if !self.ranges.is_empty() {
            return self
                .ranges
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(",");
        }
        match (self.chapters.first(), self.chapters.last()) {
            (Some(first), Some(last)) if first.number.total_cmp(&last.number).is_ne() => format!(
                "{}-{}",
                format_chapter_number(first.number),
                format_chapter_number(last.number)
            ),
            (Some(only), _) => format_chapter_number(only.number),
            _ => String::new(),
        }
    }
}

/// An opened series: the identified adapter, its title and chapter list.
pub struct Session {
    site: Arc<dyn Site>,
    settings: Arc<Settings>,
    client: Client,
    title: String,
    chapters: Vec<ChapterEntry>,
    probe_errors: Vec<SiteError>,
}

impl Session {
    /// Identifies the site for `url` among the built-in adapters and reads
    /// the series title and chapter list.
    ///
    /// # Errors
    ///
    /// See [`SessionError`]; every variant is fatal for the run.
    pub async fn open(url: &str, settings: Arc<Settings>, client: Client) -> Result<Self, SessionError> {
        let grabber = Grabber::with_default_sites(url, Arc::clone(&settings), client.clone())?;
        Self::open_with(&grabber, settings, client).await
    }

    /// Like [`Session::open`] with a caller-built grabber.
    ///
    /// # Errors
    ///
    /// See [`SessionError`].
    #[instrument(skip(grabber, settings, client), fields(url = %grabber.url()))]
    pub async fn open_with(
        grabber: &Grabber,
        settings: Arc<Settings>,
        client: Client,
    ) -> Result<Self, SessionError> {
        let identified = grabber.identify().await?;
        let site = identified.site;

        let title = site.fetch_title().await.map_err(|source| SessionError::Title {
            site: site.name(),
            source,
        })?;
        let mut chapters = site.fetch_chapters().await.map_err(|source| SessionError::Chapters {
            site: site.name(),
            source,
        })?;
        sort_by_number(&mut chapters);

        info!(site = site.name(), title = %title, chapters = chapters.len(), "series opened");
        Ok(Self {
            site,
            settings,
            client,
            title,
            chapters,
            probe_errors: identified.probe_errors,
        })
    }

    /// Name of the identified adapter.
    #[must_use]
    pub fn site_name(&self) -> &'static str {
        self.site.name()
    }

    /// Series title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Every listed chapter, ascending by number.
    #[must_use]
    pub fn chapters(&self) -> &[ChapterEntry] {
        &self.chapters
    }

    /// Errors raised by adapters probed before the winning one.
    #[must_use]
    pub fn probe_errors(&self) -> &[SiteError] {
        &self.probe_errors
    }

    /// Selects chapters by a range expression; `None` selects everything.
    #[must_use]
    pub fn select(&self, ranges: Option<&str>) -> Selection {
        let Some(expression) = ranges else {
            return Selection {
                chapters: self.chapters.clone(),
                ..Selection::default()
            };
        };

        let parsed = parse_ranges(expression);
        let chapters = filter_ranges(&self.chapters, &parsed.ranges);
        if chapters.is_empty() {
            warn!(ranges = expression, "no chapters in the requested ranges");
        }
        Selection {
            chapters,
            ranges: parsed.ranges,
            skipped: parsed.skipped,
        }
    }

    /// Downloads the selection over HTTP and packs it.
    pub async fn download(
        &self,
        selection: &Selection,
        progress: Arc<dyn ProgressSink>,
        cancel: CancellationToken,
    ) -> PipelineReport {
        let fetcher = Arc::new(HttpClient::new(self.client.clone()));
        self.download_with(fetcher, selection, progress, cancel).await
    }

    /// Downloads the selection with a custom page fetcher.
    pub async fn download_with(
        &self,
        fetcher: Arc<dyn PageFetcher>,
        selection: &Selection,
        progress: Arc<dyn ProgressSink>,
        cancel: CancellationToken,
    ) -> PipelineReport {
        let pipeline = FetchPipeline::new(Arc::clone(&self.site), fetcher, Arc::clone(&self.settings))
            .with_progress(progress)
            .with_cancellation(cancel);
        info!(
            chapters = selection.len(),
            first = selection.chapters.first().map(Filterable::number),
            last = selection.chapters.last().map(Filterable::number),
            "downloading selection"
        );
        pipeline
            .run(&self.title, selection.chapters.clone(), &selection.range_label())
            .await
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("site", &self.site.name())
            .field("title", &self.title)
            .field("chapters", &self.chapters.len())
            .finish_non_exhaustive()
    }
}
