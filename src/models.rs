//! Chapter, page and downloaded-file types shared by the adapters, the
//! pipeline and the packer.

use std::fmt;

/// Anything that can be selected by chapter number.
pub trait Filterable {
    /// Chapter number (fractional for extras, e.g. `10.5`).
    fn number(&self) -> f64;

    /// Chapter title, trimmed and with newlines replaced by spaces.
    fn title(&self) -> String;
}

/// Returns the title trimmed with embedded newlines replaced by spaces.
#[must_use]
pub fn normalize_title(title: &str) -> String {
    title.trim().replace(['\r', '\n'], " ")
}

/// Adapter-specific handle used to resolve a chapter's pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChapterLocator {
    /// Opaque identifier for API-backed sources.
    Id(String),
    /// Direct chapter page URL for HTML sources.
    Url(String),
}

impl fmt::Display for ChapterLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "id:{id}"),
            Self::Url(url) => write!(f, "{url}"),
        }
    }
}

/// A chapter as listed by a site, before its pages are resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ChapterEntry {
    /// Chapter number.
    pub number: f64,
    /// Raw chapter title as listed by the site.
    pub title: String,
    /// Chapter language, when the site reports one.
    pub language: Option<String>,
    /// Page count announced by the listing, when known.
    pub pages_hint: Option<u32>,
    /// Handle interpreted only by the adapter that produced the entry.
    pub locator: ChapterLocator,
}

impl ChapterEntry {
    /// Creates an entry with no language or page hint.
    #[must_use]
    pub fn new(number: f64, title: impl Into<String>, locator: ChapterLocator) -> Self {
        Self {
            number,
            title: title.into(),
            language: None,
            pages_hint: None,
            locator,
        }
    }
}

impl Filterable for ChapterEntry {
    fn number(&self) -> f64 {
        self.number
    }

    fn title(&self) -> String {
        normalize_title(&self.title)
    }
}

/// A single page of a chapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// 1-based page number; defines the order inside the archive.
    pub number: u32,
    /// Resolved image URL. May embed short-lived tokens.
    pub url: String,
}

impl Page {
    /// Creates a page.
    #[must_use]
    pub fn new(number: u32, url: impl Into<String>) -> Self {
        Self {
            number,
            url: url.into(),
        }
    }
}

/// A chapter with its pages resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct Chapter {
    /// Chapter title.
    pub title: String,
    /// Chapter number.
    pub number: f64,
    /// Chapter language.
    pub language: Option<String>,
    /// Number of pages in [`Chapter::pages`].
    pub pages_count: usize,
    /// Resolved pages.
    pub pages: Vec<Page>,
}

impl Chapter {
    /// Builds a chapter from an entry and its resolved pages.
    ///
    /// `pages_count` always reflects the pages actually kept.
    #[must_use]
    pub fn from_entry(entry: &ChapterEntry, pages: Vec<Page>) -> Self {
        Self {
            title: entry.title(),
            number: entry.number,
            language: entry.language.clone(),
            pages_count: pages.len(),
            pages,
        }
    }
}

impl Filterable for Chapter {
    fn number(&self) -> f64 {
        self.number
    }

    fn title(&self) -> String {
        normalize_title(&self.title)
    }
}

/// Downloaded content of exactly one page.
#[derive(Clone, PartialEq, Eq)]
pub struct FetchedFile {
    /// Page number this content belongs to.
    pub page_number: u32,
    /// Raw image bytes.
    pub data: Vec<u8>,
}

impl fmt::Debug for FetchedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchedFile")
            .field("page_number", &self.page_number)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// A chapter together with its fetched pages in ascending page order.
#[derive(Debug, Clone)]
pub struct DownloadedChapter {
    /// The resolved chapter.
    pub chapter: Chapter,
    /// Fetched pages, sorted by page number.
    pub files: Vec<FetchedFile>,
}

impl Filterable for DownloadedChapter {
    fn number(&self) -> f64 {
        self.chapter.number
    }

    fn title(&self) -> String {
        self.chapter.title()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_title_strips_newlines() {
        assert_eq!(normalize_title("  Chapter 1\nThe Start \n"), "Chapter 1 The Start");
    }

    #[test]
    fn test_chapter_from_entry_counts_kept_pages() {
        let entry = ChapterEntry::new(3.0, "Three", ChapterLocator::Id("abc".to_string()));
        let chapter = Chapter::from_entry(&entry, vec![Page::new(1, "a"), Page::new(3, "c")]);
        assert_eq!(chapter.pages_count, 2);
        assert_eq!(chapter.number, 3.0);
        assert_eq!(chapter.title, "Three");
    }

    #[test]
    fn test_fetched_file_debug_hides_bytes() {
        let file = FetchedFile {
            page_number: 2,
            data: vec![0; 1024],
        };
        let debug = format!("{file:?}");
        assert!(debug.contains("bytes: 1024"));
    }
}
