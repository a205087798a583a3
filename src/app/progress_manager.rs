//! Progress bars for download runs.
//!
//! One overall bar counts finished chapters; every in-flight chapter gets its
//! own page bar underneath. Pipeline events arrive from many tasks at once,
//! so bar bookkeeping sits behind a mutex.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use manga_downloader::download::{NoopProgress, ProgressEvent, ProgressSink};
use manga_downloader::packer::format_chapter_number;

/// Returns true when progress bars should be drawn.
pub(crate) fn should_use_progress(stderr_is_terminal: bool, quiet: bool, dumb_terminal: bool) -> bool {
    stderr_is_terminal && !quiet && !dumb_terminal
}

/// Builds the sink for a run of `total_chapters` chapters.
pub(crate) fn progress_sink(enabled: bool, total_chapters: usize) -> Arc<dyn ProgressSink> {
    if enabled {
        Arc::new(ProgressBars::new(total_chapters))
    } else {
        Arc::new(NoopProgress)
    }
}

#[derive(Default)]
struct BarState {
    chapters: HashMap<u64, ProgressBar>,
    finished: HashSet<u64>,
}

/// indicatif rendering of pipeline events.
pub(crate) struct ProgressBars {
    multi: MultiProgress,
    overall: ProgressBar,
    state: Mutex<BarState>,
}

impl ProgressBars {
    pub(crate) fn new(total_chapters: usize) -> Self {
        let multi = MultiProgress::new();
        let overall = multi.add(ProgressBar::new(total_chapters as u64));
        overall.set_style(
            ProgressStyle::with_template("{spinner} chapters [{bar:30}] {pos}/{len} {elapsed}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        overall.enable_steady_tick(Duration::from_millis(120));

        Self {
            multi,
            overall,
            state: Mutex::new(BarState::default()),
        }
    }

    fn chapter_style() -> ProgressStyle {
        ProgressStyle::with_template("  {prefix:>6} [{bar:30}] {pos}/{len} {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
    }

    fn println(&self, message: &str) {
        if self.multi.println(message).is_err() {
            eprintln!("{message}");
        }
    }
}

impl ProgressSink for ProgressBars {
    fn on_event(&self, event: ProgressEvent) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        match event {
            ProgressEvent::ChapterStarted { chapter_number, title } => {
                let bar = self.multi.insert_before(&self.overall, ProgressBar::new_spinner());
                bar.set_style(Self::chapter_style());
                bar.set_prefix(format_chapter_number(chapter_number));
                bar.set_message(title);
                state.chapters.insert(chapter_number.to_bits(), bar);
            }
            ProgressEvent::ChapterResolved { chapter_number, pages } => {
                if let Some(bar) = state.chapters.get(&chapter_number.to_bits()) {
                    bar.set_length(pages as u64);
                }
            }
            ProgressEvent::PageCompleted {
                chapter_number,
                completed,
                ..
            } => {
                if let Some(bar) = state.chapters.get(&chapter_number.to_bits()) {
                    bar.set_position(completed as u64);
                }
            }
            ProgressEvent::ChapterFinished {
                chapter_number,
                pages_ok,
                pages_failed,
            } => {
                let key = chapter_number.to_bits();
                if let Some(bar) = state.chapters.remove(&key) {
                    bar.finish_and_clear();
                }
                state.finished.insert(key);
                self.overall.inc(1);
                if pages_failed > 0 {
                    self.println(&format!(
                        "chapter {}: {pages_ok} pages, {pages_failed} missing",
                        format_chapter_number(chapter_number)
                    ));
                }
            }
            ProgressEvent::ChapterFailed { chapter_number, error } => {
                let key = chapter_number.to_bits();
                if let Some(bar) = state.chapters.remove(&key) {
                    bar.finish_and_clear();
                }
                if state.finished.insert(key) {
                    self.overall.inc(1);
                }
                self.println(&format!("failed: {error}"));
            }
            ProgressEvent::ArchiveWritten { path, .. } => {
                self.println(&format!("wrote {}", path.display()));
            }
        }
    }
}

impl Drop for ProgressBars {
    fn drop(&mut self) {
        self.overall.finish_and_clear();
    }
}
