//! Adapter for `inmanga.com` (Spanish only).
//!
//! The chapter feed is a JSON document whose `data` field is itself a JSON
//! encoded string; page ids come from the reader's page `<select>`.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use scraper::Html;
use serde::Deserialize;
use tokio::sync::OnceCell;
use tracing::{debug, warn};
use url::Url;

use crate::models::{Chapter, ChapterEntry, ChapterLocator, Page};

use super::http::{Request, get_json, get_text};
use super::utils::{compile_static_regex, css, element_text, find_uuid, sanitize_title};
use super::{Site, SiteContext, SiteError};

const NAME: &str = "inmanga";

/// Default site base URL.
const DEFAULT_SITE_BASE: &str = "https://inmanga.com";

/// Default image host prefix; the page id is appended.
const DEFAULT_IMAGE_BASE: &str = "https://pack-yak.intomanga.com/images/manga/ms/chapter/ch/page/p/";

static HOST_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"inmanga\.com"));

/// Outer envelope of the chapter feed.
#[derive(Debug, Deserialize)]
struct FeedEnvelope {
    #[serde(alias = "Data")]
    data: String,
}

#[derive(Debug, Deserialize)]
struct Feed {
    #[serde(rename = "Result", alias = "result", default)]
    result: Vec<FeedChapter>,
}

#[derive(Debug, Deserialize)]
struct FeedChapter {
    #[serde(rename = "Identification", alias = "identification")]
    id: String,
    #[serde(rename = "Number", alias = "number")]
    number: f64,
    #[serde(rename = "PagesCount", alias = "pagesCount", default)]
    pages_count: f64,
}

/// Adapter for InManga.
pub struct Inmanga {
    ctx: SiteContext,
    site_base: String,
    image_base: String,
    title: OnceCell<String>,
}

impl Inmanga {
    /// Creates the adapter for the series in `ctx`.
    #[must_use]
    pub fn new(ctx: SiteContext) -> Self {
        Self::with_base_urls(ctx, DEFAULT_SITE_BASE, DEFAULT_IMAGE_BASE)
    }

    /// Creates the adapter with custom API and image hosts (for testing with wiremock).
    #[must_use]
    pub fn with_base_urls(
        ctx: SiteContext,
        site_base: impl Into<String>,
        image_base: impl Into<String>,
    ) -> Self {
        Self {
            ctx,
            site_base: site_base.into().trim_end_matches('/').to_string(),
            image_base: image_base.into(),
            title: OnceCell::new(),
        }
    }

    fn manga_id(&self) -> Result<String, SiteError> {
        find_uuid(self.ctx.url.as_str()).ok_or_else(|| {
            SiteError::parse(NAME, self.ctx.url.as_str(), "no manga identification in URL")
        })
    }

    fn endpoint(&self, path: &str, key: &str, value: &str) -> Result<String, SiteError> {
        let raw = format!("{}/{path}", self.site_base);
        let mut url = Url::parse(&raw).map_err(|e| SiteError::invalid_url(&raw, e.to_string()))?;
        url.query_pairs_mut().append_pair(key, value);
        Ok(url.to_string())
    }
}

impl std::fmt::Debug for Inmanga {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Inmanga")
            .field("url", &self.ctx.url.as_str())
            .field("site_base", &self.site_base)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Site for Inmanga {
    fn name(&self) -> &'static str {
        NAME
    }

    fn context(&self) -> &SiteContext {
        &self.ctx
    }

    async fn validate_url(&self) -> Result<bool, SiteError> {
        Ok(HOST_RE.is_match(self.ctx.url.as_str()))
    }

    async fn fetch_title(&self) -> Result<String, SiteError> {
        self.title
            .get_or_try_init(|| async {
                let url = self.ctx.url.as_str();
                let body = get_text(&self.ctx.client, Request::new(NAME, url)).await?;
                parse_title(&body, url)
            })
            .await
            .cloned()
    }

    #[tracing::instrument(skip(self), fields(site = NAME))]
    async fn fetch_chapters(&self) -> Result<Vec<ChapterEntry>, SiteError> {
        let id = self.manga_id()?;
        let url = self.endpoint("chapter/getall", "mangaIdentification", &id)?;

        let envelope: FeedEnvelope = get_json(&self.ctx.client, Request::new(NAME, &url)).await?;
        let feed: Feed = serde_json::from_str(&envelope.data)
            .map_err(|e| SiteError::parse(NAME, &url, format!("invalid chapter feed: {e}")))?;
        debug!(chapters = feed.result.len(), "Fetched chapter feed");

        Ok(feed.result.into_iter().map(entry_from_feed).collect())
    }

    #[tracing::instrument(skip(self, entry), fields(site = NAME, chapter = entry.number))]
    async fn fetch_chapter(&self, entry: &ChapterEntry) -> Result<Chapter, SiteError> {
        let ChapterLocator::Id(id) = &entry.locator else {
            return Err(SiteError::unsupported_chapter(NAME, &entry.title));
        };
        let url = self.endpoint("chapter/chapterIndexControls", "identification", id)?;

        let body = get_text(&self.ctx.client, Request::new(NAME, &url)).await?;
        let pages = parse_pages(&body, &url, &self.image_base, &entry.title)?;

        if let Some(hint) = entry.pages_hint
            && usize::try_from(hint).is_ok_and(|hint| hint != pages.len())
        {
            debug!(hint, resolved = pages.len(), "page count differs from feed");
        }

        let mut chapter = Chapter::from_entry(entry, pages);
        chapter.language = Some("es".to_string());
        Ok(chapter)
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn entry_from_feed(chapter: FeedChapter) -> ChapterEntry {
    let mut entry = ChapterEntry::new(
        chapter.number,
        format!("Capítulo {:04}", chapter.number as i64),
        ChapterLocator::Id(chapter.id),
    );
    entry.language = Some("es".to_string());
    entry.pages_hint = Some(chapter.pages_count.max(0.0) as u32);
    entry
}

fn parse_title(body: &str, url: &str) -> Result<String, SiteError> {
    let document = Html::parse_document(body);
    let h1 = css(NAME, url, "h1")?;
    Ok(sanitize_title(
        &document.select(&h1).map(element_text).collect::<String>(),
    ))
}

fn parse_pages(
    body: &str,
    url: &str,
    image_base: &str,
    chapter_title: &str,
) -> Result<Vec<Page>, SiteError> {
    let document = Html::parse_document(body);
    let select = css(NAME, url, "select.PageListClass")?;
    let option = css(NAME, url, "option")?;

    // the reader repeats the page list, only the first one is used
    let Some(list) = document.select(&select).next() else {
        return Err(SiteError::parse(NAME, url, "page list not found"));
    };

    let mut pages = Vec::new();
    for (index, item) in list.select(&option).enumerate() {
        let position = u32::try_from(index + 1).unwrap_or(u32::MAX);
        let number = element_text(item).trim().parse::<u32>().unwrap_or(position);
        let id = item.value().attr("value").unwrap_or_default().trim();
        if id.is_empty() {
            warn!(page = number, chapter = chapter_title, "page has no id, ignoring");
            continue;
        }
        pages.push(Page::new(number, format!("{image_base}{id}")));
    }
    Ok(pages)
}
