//! Progress side-channel for the fetch pipeline.

use std::path::PathBuf;

/// Something that happened while downloading.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// A chapter task got its permit and starts resolving pages.
    ChapterStarted {
        /// Chapter number.
        chapter_number: f64,
        /// Chapter title.
        title: String,
    },

    /// Page URLs were resolved; `pages` fetches follow.
    ChapterResolved {
        /// Chapter number.
        chapter_number: f64,
        /// Number of pages to fetch.
        pages: usize,
    },

    /// One page fetch finished, successfully or not.
    PageCompleted {
        /// Chapter number.
        chapter_number: f64,
        /// Page number.
        page_number: u32,
        /// Pages finished so far in this chapter (including this one).
        completed: usize,
        /// Pages in this chapter.
        total: usize,
        /// `completed * 100 / total`.
        percent: usize,
        /// Failure description when the fetch failed.
        error: Option<String>,
    },

    /// All pages of a chapter were collected.
    ChapterFinished {
        /// Chapter number.
        chapter_number: f64,
        /// Pages fetched.
        pages_ok: usize,
        /// Pages that failed.
        pages_failed: usize,
    },

    /// The chapter produced no output.
    ChapterFailed {
        /// Chapter number.
        chapter_number: f64,
        /// Failure description.
        error: String,
    },

    /// An archive was written.
    ArchiveWritten {
        /// Chapter number, `None` for a bundle.
        chapter_number: Option<f64>,
        /// Archive path.
        path: PathBuf,
    },
}

/// Receives pipeline progress events; called concurrently from tasks.
pub trait ProgressSink: Send + Sync {
    /// Handles one event. Must not block for long.
    fn on_event(&self, event: ProgressEvent);
}

/// Sink discarding every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn on_event(&self, _event: ProgressEvent) {}
}

/// Integer percentage of `completed` over `total`; `0` when `total` is zero.
#[must_use]
pub fn percent(completed: usize, total: usize) -> usize {
    if total == 0 {
        return 0;
    }
    completed * 100 / total
}
