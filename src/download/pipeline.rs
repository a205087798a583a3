//! Two-stage concurrent fetch pipeline.
//!
//! Stage A runs one task per selected chapter, admitted by a semaphore of at
//! most [`MAX_CHAPTER_CONCURRENCY`] permits. Each chapter task resolves its
//! pages and runs stage B: one task per page, admitted by a per-chapter
//! semaphore of at most [`MAX_PAGE_CONCURRENCY`] permits. Permits are RAII
//! guards released on every exit path.
//!
//! Failures are contained: a failed page is counted and logged, a chapter
//! fails only when no page succeeded, and a failed chapter never affects its
//! siblings. Page and chapter order in the output is restored by sorting
//! after the concurrent phase, so completion order never leaks into archives.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::future::join_all;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::{MAX_CHAPTER_CONCURRENCY, MAX_PAGE_CONCURRENCY, Settings};
use crate::models::{Chapter, ChapterEntry, DownloadedChapter, FetchedFile, Filterable, Page};
use crate::packer::{PackError, Packer, versioned_name};
use crate::site::Site;

use super::progress::percent;
use super::{ChapterError, DownloadError, NoopProgress, PageFetcher, ProgressEvent, ProgressSink};

/// Counters for one pipeline run, updated concurrently by tasks.
#[derive(Debug, Default)]
pub struct PipelineStats {
    chapters_completed: AtomicUsize,
    chapters_failed: AtomicUsize,
    pages_completed: AtomicUsize,
    pages_failed: AtomicUsize,
}

impl PipelineStats {
    /// Chapters that produced output (an archive, or a bundle contribution).
    #[must_use]
    pub fn chapters_completed(&self) -> usize {
        self.chapters_completed.load(Ordering::SeqCst)
    }

    /// Chapters that produced no output.
    #[must_use]
    pub fn chapters_failed(&self) -> usize {
        self.chapters_failed.load(Ordering::SeqCst)
    }

    /// Pages fetched successfully.
    #[must_use]
    pub fn pages_completed(&self) -> usize {
        self.pages_completed.load(Ordering::SeqCst)
    }

    /// Pages that failed (cancelled pages are not counted).
    #[must_use]
    pub fn pages_failed(&self) -> usize {
        self.pages_failed.load(Ordering::SeqCst)
    }

    fn increment(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::SeqCst);
    }
}

/// A chapter that produced no output, with the reason.
#[derive(Debug)]
pub struct ChapterFailure {
    /// Chapter number.
    pub number: f64,
    /// Chapter title.
    pub title: String,
    /// Why it failed.
    pub error: ChapterError,
}

/// Outcome of a pipeline run.
#[derive(Debug, Default)]
pub struct PipelineReport {
    /// Per-chapter archives, ascending by chapter number.
    pub archives: Vec<PathBuf>,
    /// Bundle result; `None` when not bundling or nothing was downloaded.
    pub bundle: Option<Result<PathBuf, PackError>>,
    /// Failed chapters, ascending by chapter number.
    pub failures: Vec<ChapterFailure>,
    /// Chapters that produced output.
    pub chapters_completed: usize,
    /// Pages fetched successfully.
    pub pages_completed: usize,
    /// Pages that failed.
    pub pages_failed: usize,
}

impl PipelineReport {
    /// Number of archive files written.
    #[must_use]
    pub fn archives_written(&self) -> usize {
        self.archives.len() + usize::from(matches!(self.bundle, Some(Ok(_))))
    }

    /// Returns true if every chapter and the bundle (if any) succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && !matches!(self.bundle, Some(Err(_)))
    }

    /// Returns true if any chapter was abandoned because of cancellation.
    #[must_use]
    pub fn was_cancelled(&self) -> bool {
        self.failures.iter().any(|f| f.error.is_cancelled())
    }
}

/// State shared by every task of one run.
struct RunShared {
    site: Arc<dyn Site>,
    fetcher: Arc<dyn PageFetcher>,
    packer: Packer,
    progress: Arc<dyn ProgressSink>,
    cancel: CancellationToken,
    series: String,
    referer: String,
    bundle: bool,
    page_limit: usize,
    stats: PipelineStats,
    collected: Mutex<Vec<DownloadedChapter>>,
    archive_names: Mutex<HashSet<String>>,
}

impl RunShared {
    /// Claims `name` for this run, or the first free ` v2`, ` v3`, ...
    /// variant when another chapter already rendered the same name.
    fn reserve_archive_name(&self, name: &str) -> String {
        let mut taken = self.archive_names.lock().unwrap_or_else(PoisonError::into_inner);
        let mut version = 1;
        loop {
            let candidate = versioned_name(name, version);
            if taken.insert(candidate.clone()) {
                return candidate;
            }
            version += 1;
        }
    }
}

/// Downloads chapters of one site and packs them.
pub struct FetchPipeline {
    site: Arc<dyn Site>,
    fetcher: Arc<dyn PageFetcher>,
    settings: Arc<Settings>,
    packer: Packer,
    progress: Arc<dyn ProgressSink>,
    cancel: CancellationToken,
}

impl FetchPipeline {
    /// Creates a pipeline packing into the settings' output directory, with
    /// no progress reporting and a fresh cancellation token.
    #[must_use]
    pub fn new(site: Arc<dyn Site>, fetcher: Arc<dyn PageFetcher>, settings: Arc<Settings>) -> Self {
        let packer = Packer::from_settings(&settings);
        Self {
            site,
            fetcher,
            settings,
            packer,
            progress: Arc::new(NoopProgress),
            cancel: CancellationToken::new(),
        }
    }

    /// Sets the progress sink.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Uses `cancel` to abandon in-flight work.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token cancelling this pipeline.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Downloads `chapters` and packs them, one archive per chapter or a
    /// single bundle labelled `range_label`.
    ///
    /// Never fails as a whole: every chapter outcome is in the report.
    #[instrument(skip(self, chapters), fields(site = self.site.name(), chapters = chapters.len()))]
    pub async fn run(&self, series: &str, chapters: Vec<ChapterEntry>, range_label: &str) -> PipelineReport {
        let chapter_limit = stage_limit(self.settings.max_concurrency.chapters, MAX_CHAPTER_CONCURRENCY);
        let page_limit = stage_limit(self.settings.max_concurrency.pages, MAX_PAGE_CONCURRENCY);
        let shared = Arc::new(RunShared {
            site: Arc::clone(&self.site),
            fetcher: Arc::clone(&self.fetcher),
            packer: self.packer.clone(),
            progress: Arc::clone(&self.progress),
            cancel: self.cancel.clone(),
            series: series.to_string(),
            referer: self.site.base_url(),
            bundle: self.settings.bundle,
            page_limit,
            stats: PipelineStats::default(),
            collected: Mutex::new(Vec::new()),
            archive_names: Mutex::new(HashSet::new()),
        });
        let semaphore = Arc::new(Semaphore::new(chapter_limit));

        info!(chapter_limit, page_limit, bundle = shared.bundle, "starting chapter downloads");

        let mut handles = Vec::with_capacity(chapters.len());
        for entry in chapters {
            let number = entry.number;
            let title = entry.title();
            let shared = Arc::clone(&shared);
            let semaphore = Arc::clone(&semaphore);

            handles.push((
                number,
                title,
                tokio::spawn(async move {
                    let _permit = tokio::select! {
                        biased;
                        () = shared.cancel.cancelled() => {
                            return Err(ChapterError::Cancelled { chapter: entry.title() });
                        }
                        permit = semaphore.acquire_owned() => permit.map_err(|_| {
                            ChapterError::Cancelled { chapter: entry.title() }
                        })?,
                    };
                    process_chapter(&shared, entry).await
                }),
            ));
        }

        debug!(task_count = handles.len(), "waiting for chapter tasks");

        let mut report = PipelineReport::default();
        let mut archives = Vec::new();
        for (number, title, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => {
                    warn!(chapter = number, error = %e, "chapter task panicked");
                    Err(ChapterError::TaskFailed {
                        chapter: title.clone(),
                        reason: e.to_string(),
                    })
                }
            };

            match result {
                Ok(Some(path)) => archives.push((number, path)),
                Ok(None) => {}
                Err(error) => {
                    if error.is_cancelled() {
                        debug!(chapter = number, "chapter cancelled");
                    } else {
                        warn!(chapter = number, error = %error, "chapter failed");
                    }
                    PipelineStats::increment(&shared.stats.chapters_failed);
                    shared.progress.on_event(ProgressEvent::ChapterFailed {
                        chapter_number: number,
                        error: error.to_string(),
                    });
                    report.failures.push(ChapterFailure { number, title, error });
                }
            }
        }

        archives.sort_by(|a, b| a.0.total_cmp(&b.0));
        report.archives = archives.into_iter().map(|(_, path)| path).collect();
        report.failures.sort_by(|a, b| a.number.total_cmp(&b.number));

        if shared.bundle {
            report.bundle = pack_bundle(&shared, range_label).await;
        }

        report.chapters_completed = shared.stats.chapters_completed();
        report.pages_completed = shared.stats.pages_completed();
        report.pages_failed = shared.stats.pages_failed();

        info!(
            chapters_completed = report.chapters_completed,
            chapters_failed = shared.stats.chapters_failed(),
            pages_completed = report.pages_completed,
            pages_failed = report.pages_failed,
            archives = report.archives_written(),
            "downloads finished"
        );
        report
    }
}

impl std::fmt::Debug for FetchPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchPipeline")
            .field("site", &self.site.name())
            .field("max_concurrency", &self.settings.max_concurrency)
            .field("bundle", &self.settings.bundle)
            .field("packer", &self.packer)
            .finish_non_exhaustive()
    }
}

fn stage_limit(requested: u8, ceiling: u8) -> usize {
    usize::from(requested.clamp(1, ceiling))
}

#[instrument(skip(shared, entry), fields(chapter = entry.number))]
async fn process_chapter(
    shared: &Arc<RunShared>,
    entry: ChapterEntry,
) -> Result<Option<PathBuf>, ChapterError> {
    let title = entry.title();
    shared.progress.on_event(ProgressEvent::ChapterStarted {
        chapter_number: entry.number,
        title: title.clone(),
    });

    let chapter = tokio::select! {
        biased;
        () = shared.cancel.cancelled() => return Err(ChapterError::Cancelled { chapter: title }),
        result = shared.site.fetch_chapter(&entry) => {
            result.map_err(|source| ChapterError::Resolve { chapter: title.clone(), source })?
        }
    };

    if chapter.pages.is_empty() {
        warn!(chapter = entry.number, title = %title, "chapter has no pages, skipping");
        return Err(ChapterError::NoPages { chapter: title });
    }
    shared.progress.on_event(ProgressEvent::ChapterResolved {
        chapter_number: entry.number,
        pages: chapter.pages.len(),
    });

    let (files, failed) = fetch_pages(shared, &chapter).await;
    if shared.cancel.is_cancelled() {
        return Err(ChapterError::Cancelled { chapter: title });
    }
    if files.is_empty() {
        return Err(ChapterError::AllPagesFailed { chapter: title, failed });
    }
    if failed > 0 {
        warn!(chapter = entry.number, failed, kept = files.len(), "chapter is missing pages");
    }
    shared.progress.on_event(ProgressEvent::ChapterFinished {
        chapter_number: entry.number,
        pages_ok: files.len(),
        pages_failed: failed,
    });

    let downloaded = DownloadedChapter { chapter, files };
    if shared.bundle {
        shared
            .collected
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(downloaded);
        PipelineStats::increment(&shared.stats.chapters_completed);
        return Ok(None);
    }

    let rendered = shared
        .packer
        .chapter_name(&shared.series, &downloaded)
        .map_err(|e| ChapterError::Pack {
            chapter: title.clone(),
            source: e.into(),
        })?;
    let name = shared.reserve_archive_name(&rendered);
    if name != rendered {
        warn!(
            chapter = entry.number,
            name = %name,
            "archive name already used in this run, adding version suffix"
        );
    }

    let packer = shared.packer.clone();
    let path = pack_blocking(packer.output_dir().to_path_buf(), move || {
        packer.pack_named(&name, &downloaded)
    })
    .await
    .map_err(|source| ChapterError::Pack { chapter: title, source })?;

    shared.progress.on_event(ProgressEvent::ArchiveWritten {
        chapter_number: Some(entry.number),
        path: path.clone(),
    });
    PipelineStats::increment(&shared.stats.chapters_completed);
    Ok(Some(path))
}

/// Fetches every page of `chapter`; returns the fetched files in ascending
/// page order and the number of failed pages.
async fn fetch_pages(shared: &Arc<RunShared>, chapter: &Chapter) -> (Vec<FetchedFile>, usize) {
    let semaphore = Arc::new(Semaphore::new(shared.page_limit));
    let total = chapter.pages.len();
    let completed = Arc::new(AtomicUsize::new(0));
    let chapter_number = chapter.number;

    let mut handles = Vec::with_capacity(total);
    for page in chapter.pages.iter().cloned() {
        let shared = Arc::clone(shared);
        let semaphore = Arc::clone(&semaphore);
        let completed = Arc::clone(&completed);

        handles.push(tokio::spawn(async move {
            let result = fetch_page(&shared, &semaphore, &page).await;
            let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
            shared.progress.on_event(ProgressEvent::PageCompleted {
                chapter_number,
                page_number: page.number,
                completed: done,
                total,
                percent: percent(done, total),
                error: result.as_ref().err().map(ToString::to_string),
            });
            (page.number, result)
        }));
    }

    let mut files = Vec::with_capacity(total);
    let mut failed = 0;
    for joined in join_all(handles).await {
        match joined {
            Ok((page_number, Ok(data))) => {
                PipelineStats::increment(&shared.stats.pages_completed);
                files.push(FetchedFile { page_number, data });
            }
            Ok((page_number, Err(error))) => {
                failed += 1;
                if error.is_cancelled() {
                    debug!(chapter = chapter_number, page = page_number, "page cancelled");
                } else {
                    PipelineStats::increment(&shared.stats.pages_failed);
                    warn!(chapter = chapter_number, page = page_number, error = %error, "page download failed");
                }
            }
            Err(e) => {
                failed += 1;
                PipelineStats::increment(&shared.stats.pages_failed);
                warn!(chapter = chapter_number, error = %e, "page task panicked");
            }
        }
    }

    files.sort_by_key(|file| file.page_number);
    (files, failed)
}

async fn fetch_page(shared: &RunShared, semaphore: &Semaphore, page: &Page) -> Result<Vec<u8>, DownloadError> {
    let _permit = tokio::select! {
        biased;
        () = shared.cancel.cancelled() => return Err(DownloadError::cancelled(&page.url)),
        permit = semaphore.acquire() => permit.map_err(|_| DownloadError::cancelled(&page.url))?,
    };

    tokio::select! {
        biased;
        () = shared.cancel.cancelled() => Err(DownloadError::cancelled(&page.url)),
        result = shared.fetcher.fetch(page, Some(&shared.referer)) => result,
    }
}

async fn pack_bundle(shared: &RunShared, range_label: &str) -> Option<Result<PathBuf, PackError>> {
    let mut collected =
        std::mem::take(&mut *shared.collected.lock().unwrap_or_else(PoisonError::into_inner));
    if collected.is_empty() {
        warn!("no chapter downloaded, bundle not written");
        return None;
    }
    if shared.cancel.is_cancelled() {
        info!("run cancelled, bundle not written");
        return None;
    }

    collected.sort_by(|a, b| a.number().total_cmp(&b.number()));
    let packer = shared.packer.clone();
    let series = shared.series.clone();
    let label = range_label.to_string();
    let result = pack_blocking(packer.output_dir().to_path_buf(), move || {
        packer.pack_bundle(&series, &collected, &label)
    })
    .await;

    match &result {
        Ok(path) => shared.progress.on_event(ProgressEvent::ArchiveWritten {
            chapter_number: None,
            path: path.clone(),
        }),
        Err(error) => warn!(error = %error, "bundle could not be written"),
    }
    Some(result)
}

/// Runs a blocking zip write off the async workers.
async fn pack_blocking<F>(output_dir: PathBuf, pack: F) -> Result<PathBuf, PackError>
where
    F: FnOnce() -> Result<PathBuf, PackError> + Send + 'static,
{
    tokio::task::spawn_blocking(pack)
        .await
        .unwrap_or_else(|e| Err(PackError::io(output_dir, std::io::Error::other(e.to_string()))))
}
