//! Adapter for `mangadex.org` backed by its public JSON API.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use tokio::sync::OnceCell;
use tracing::{debug, warn};
use url::Url;

use crate::models::{Chapter, ChapterEntry, ChapterLocator, Page};

use super::http::{Request, get_json};
use super::utils::{compile_static_regex, find_uuid};
use super::{Site, SiteContext, SiteError};

const NAME: &str = "mangadex";

/// Default API base URL.
const DEFAULT_API_BASE: &str = "https://api.mangadex.org";

/// Chapters requested per feed page (API maximum).
const FEED_PAGE_SIZE: usize = 500;

static HOST_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"mangadex\.org"));

// ==================== API Response Types ====================

#[derive(Debug, Deserialize)]
struct MangaResponse {
    data: MangaData,
}

#[derive(Debug, Deserialize)]
struct MangaData {
    attributes: MangaAttributes,
}

#[derive(Debug, Deserialize)]
struct MangaAttributes {
    #[serde(default)]
    title: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct FeedResponse {
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    data: Vec<FeedChapter>,
    #[serde(default)]
    total: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct FeedChapter {
    id: String,
    attributes: FeedChapterAttributes,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeedChapterAttributes {
    #[serde(default)]
    chapter: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    translated_language: Option<String>,
    #[serde(default)]
    pages: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AtHomeResponse {
    base_url: String,
    chapter: AtHomeChapter,
}

#[derive(Debug, Deserialize)]
struct AtHomeChapter {
    hash: String,
    #[serde(default)]
    data: Vec<String>,
}

// ==================== Mangadex ====================

/// Adapter for MangaDex.
pub struct Mangadex {
    ctx: SiteContext,
    api_base: String,
    title: OnceCell<String>,
}

impl Mangadex {
    /// Creates the adapter for the series in `ctx`.
    #[must_use]
    pub fn new(ctx: SiteContext) -> Self {
        Self::with_api_base(ctx, DEFAULT_API_BASE)
    }

    /// Creates the adapter with a custom API base URL (for testing with wiremock).
    #[must_use]
    pub fn with_api_base(ctx: SiteContext, api_base: impl Into<String>) -> Self {
        Self {
            ctx,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            title: OnceCell::new(),
        }
    }

    fn manga_id(&self) -> Result<String, SiteError> {
        find_uuid(self.ctx.url.as_str())
            .ok_or_else(|| SiteError::parse(NAME, self.ctx.url.as_str(), "no manga id in URL"))
    }

    fn api_url(&self, path: &str) -> Result<Url, SiteError> {
        let raw = format!("{}/{path}", self.api_base);
        Url::parse(&raw).map_err(|e| SiteError::invalid_url(&raw, e.to_string()))
    }

    fn feed_url(&self, id: &str, offset: usize) -> Result<Url, SiteError> {
        let mut url = self.api_url(&format!("manga/{id}/feed"))?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("limit", &FEED_PAGE_SIZE.to_string())
                .append_pair("order[volume]", "asc")
                .append_pair("order[chapter]", "asc")
                .append_pair("offset", &offset.to_string());
            if let Some(language) = self.ctx.settings.preferred_language() {
                query.append_pair("translatedLanguage[]", language);
            }
        }
        Ok(url)
    }
}

impl std::fmt::Debug for Mangadex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mangadex")
            .field("url", &self.ctx.url.as_str())
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Site for Mangadex {
    fn name(&self) -> &'static str {
        NAME
    }

    fn context(&self) -> &SiteContext {
        &self.ctx
    }

    async fn validate_url(&self) -> Result<bool, SiteError> {
        Ok(HOST_RE.is_match(self.ctx.url.as_str()))
    }

    #[tracing::instrument(skip(self), fields(site = NAME))]
    async fn fetch_title(&self) -> Result<String, SiteError> {
        self.title
            .get_or_try_init(|| async {
                let id = self.manga_id()?;
                let url = self.api_url(&format!("manga/{id}"))?;
                let base = self.base_url();
                let response: MangaResponse = get_json(
                    &self.ctx.client,
                    Request::new(NAME, url.as_str()).referer(&base),
                )
                .await?;
                pick_title(response.data.attributes.title)
                    .ok_or_else(|| SiteError::parse(NAME, url.as_str(), "manga has no title"))
            })
            .await
            .cloned()
    }

    #[tracing::instrument(skip(self), fields(site = NAME))]
    async fn fetch_chapters(&self) -> Result<Vec<ChapterEntry>, SiteError> {
        let id = self.manga_id()?;
        let mut chapters = Vec::new();
        let mut offset = 0;

        loop {
            let url = self.feed_url(&id, offset)?;
            let feed: FeedResponse = get_json(&self.ctx.client, Request::new(NAME, url.as_str())).await?;
            if let Some(result) = feed.result.as_deref().filter(|r| *r != "ok") {
                return Err(SiteError::parse(NAME, url.as_str(), format!("feed result '{result}'")));
            }
            if feed.data.is_empty() {
                break;
            }

            offset += feed.data.len();
            chapters.extend(feed.data.into_iter().map(entry_from_feed));
            debug!(offset, total = ?feed.total, "Fetched chapter feed page");

            if feed.total.is_some_and(|total| offset >= total) {
                break;
            }
        }

        Ok(chapters)
    }

    #[tracing::instrument(skip(self, entry), fields(site = NAME, chapter = entry.number))]
    async fn fetch_chapter(&self, entry: &ChapterEntry) -> Result<Chapter, SiteError> {
        let ChapterLocator::Id(id) = &entry.locator else {
            return Err(SiteError::unsupported_chapter(NAME, &entry.title));
        };
        let url = self.api_url(&format!("at-home/server/{id}"))?;
        let at_home: AtHomeResponse = get_json(&self.ctx.client, Request::new(NAME, url.as_str())).await?;

        let base = at_home.base_url.trim_end_matches('/');
        let hash = &at_home.chapter.hash;
        let pages = at_home
            .chapter
            .data
            .iter()
            .enumerate()
            .filter_map(|(index, file)| {
                let number = u32::try_from(index + 1).unwrap_or(u32::MAX);
                if file.trim().is_empty() {
                    warn!(page = number, chapter = %entry.title, "page has no file name, ignoring");
                    return None;
                }
                Some(Page::new(number, format!("{base}/data/{hash}/{}", file.trim())))
            })
            .collect();

        let mut chapter = Chapter::from_entry(entry, pages);
        chapter.title = chapter_title(entry.number, &entry.title);
        Ok(chapter)
    }
}

fn pick_title(mut titles: BTreeMap<String, String>) -> Option<String> {
    titles
        .remove("en")
        .or_else(|| titles.into_values().next())
        .map(|title| title.trim().to_string())
        .filter(|title| !title.is_empty())
}

fn entry_from_feed(chapter: FeedChapter) -> ChapterEntry {
    let attributes = chapter.attributes;
    let number = attributes
        .chapter
        .as_deref()
        .and_then(|raw| raw.trim().parse::<f64>().ok())
        .unwrap_or(0.0);
    let mut entry = ChapterEntry::new(
        number,
        attributes.title.unwrap_or_default(),
        ChapterLocator::Id(chapter.id),
    );
    entry.language = attributes.translated_language;
    entry.pages_hint = attributes.pages;
    entry
}

#[allow(clippy::cast_possible_truncation)]
fn chapter_title(number: f64, title: &str) -> String {
    format!("Chapter {:04} {}", number as i64, title.trim())
        .trim_end()
        .to_string()
}
