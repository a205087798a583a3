//! In-memory site and page fetcher for pipeline tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use manga_downloader::config::Settings;
use manga_downloader::download::{DownloadError, PageFetcher, ProgressEvent, ProgressSink};
use manga_downloader::models::{Chapter, ChapterEntry, ChapterLocator, Page};
use manga_downloader::site::{Site, SiteContext, SiteError};

pub const SERIES_URL: &str = "https://comics.example/manga/series/";

/// Site serving a fixed chapter table: chapter number -> page URLs.
pub struct FakeSite {
    ctx: SiteContext,
    chapters: Vec<(f64, Vec<String>)>,
    broken: HashSet<u64>,
}

impl FakeSite {
    pub fn new(settings: Arc<Settings>) -> Self {
        let ctx = SiteContext::new(SERIES_URL, settings, reqwest::Client::new()).unwrap();
        Self {
            ctx,
            chapters: Vec::new(),
            broken: HashSet::new(),
        }
    }

    /// Adds chapter `number` with `pages` pages named `c{number}-p{page}`.
    pub fn chapter(mut self, number: f64, pages: u32) -> Self {
        let urls = (1..=pages)
            .map(|page| format!("https://cdn.example/c{number}-p{page}.jpg"))
            .collect();
        self.chapters.push((number, urls));
        self
    }

    /// Adds chapter `number` whose page resolution fails.
    pub fn broken_chapter(mut self, number: f64) -> Self {
        self.broken.insert(number.to_bits());
        self.chapters.push((number, Vec::new()));
        self
    }

    pub fn entries(&self) -> Vec<ChapterEntry> {
        self.chapters
            .iter()
            .map(|(number, _)| {
                ChapterEntry::new(
                    *number,
                    format!("Chapter {number}"),
                    ChapterLocator::Id(number.to_string()),
                )
            })
            .collect()
    }
}

#[async_trait]
impl Site for FakeSite {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn context(&self) -> &SiteContext {
        &self.ctx
    }

    async fn validate_url(&self) -> Result<bool, SiteError> {
        Ok(true)
    }

    async fn fetch_title(&self) -> Result<String, SiteError> {
        Ok("Series".to_string())
    }

    async fn fetch_chapters(&self) -> Result<Vec<ChapterEntry>, SiteError> {
        Ok(self.entries())
    }

    async fn fetch_chapter(&self, entry: &ChapterEntry) -> Result<Chapter, SiteError> {
        if self.broken.contains(&entry.number.to_bits()) {
            return Err(SiteError::parse("fake", SERIES_URL, "chapter page is empty"));
        }
        let urls = self
            .chapters
            .iter()
            .find(|(number, _)| number.total_cmp(&entry.number).is_eq())
            .map(|(_, urls)| urls.clone())
            .unwrap_or_default();
        let pages = urls
            .into_iter()
            .enumerate()
            .map(|(index, url)| Page::new(u32::try_from(index + 1).unwrap(), url))
            .collect();
        Ok(Chapter::from_entry(entry, pages))
    }
}

/// Page fetcher returning the page URL as body, with per-URL latency and
/// failures, tracking the number of concurrent fetches.
#[derive(Default)]
pub struct ScriptedFetcher {
    delays: HashMap<String, Duration>,
    failures: HashSet<String>,
    default_delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: AtomicUsize,
    referers: Mutex<Vec<Option<String>>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn default_delay(mut self, delay: Duration) -> Self {
        self.default_delay = delay;
        self
    }

    pub fn delay(mut self, url: &str, delay: Duration) -> Self {
        self.delays.insert(url.to_string(), delay);
        self
    }

    pub fn fail(mut self, url: &str) -> Self {
        self.failures.insert(url.to_string());
        self
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn referers(&self) -> Vec<Option<String>> {
        self.referers.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageFetcher for ScriptedFetcher {
    async fn fetch(&self, page: &Page, referer: Option<&str>) -> Result<Vec<u8>, DownloadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.referers.lock().unwrap().push(referer.map(str::to_string));

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = self.delays.get(&page.url).copied().unwrap_or(self.default_delay);
        tokio::time::sleep(delay).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failures.contains(&page.url) {
            return Err(DownloadError::http_status(&page.url, 500));
        }
        Ok(page.url.clone().into_bytes())
    }
}

/// Sink keeping every event.
#[derive(Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingProgress {
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl ProgressSink for RecordingProgress {
    fn on_event(&self, event: ProgressEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Settings writing into `output_dir` with a simple template.
pub fn settings(output_dir: &std::path::Path, chapters: u8, pages: u8, bundle: bool) -> Settings {
    Settings {
        bundle,
        max_concurrency: manga_downloader::MaxConcurrency::clamped(chapters, pages),
        output_dir: output_dir.to_path_buf(),
        filename_template: "{Series} {Number}".to_string(),
        ..Settings::default()
    }
}

/// Reads every entry of a CBZ archive in archive order.
pub fn read_cbz(path: &std::path::Path) -> Vec<(String, String)> {
    use std::io::Read;

    let file = std::fs::File::open(path).unwrap();
    let mut archive = zip::ZipArchive::new(file).unwrap();
    (0..archive.len())
        .map(|index| {
            let mut entry = archive.by_index(index).unwrap();
            let mut content = String::new();
            entry.read_to_string(&mut content).unwrap();
            (entry.name().to_string(), content)
        })
        .collect()
}
