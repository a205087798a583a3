//! Adapter for TCB-style WordPress manga sites.
//!
//! The chapter list is served by `POST {base}/manga/<slug>/ajax/chapters`
//! and rendered as `li` items; chapter pages keep their images inside
//! `div.reading-content`.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use scraper::Html;
use tokio::sync::OnceCell;
use tracing::warn;

use crate::models::{Chapter, ChapterEntry, ChapterLocator, Page};

use super::http::{Request, get_text, post_text};
use super::utils::{absolutize_url, compile_static_regex, css, first_number};
use super::{Site, SiteContext, SiteError};

const NAME: &str = "tcb";

static SLUG_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"manga/(.*)/$"));

/// One `li` item of the ajax chapter list.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ChapterItem {
    title: String,
    href: String,
}

/// Adapter for WordPress sites exposing the `ajax/chapters` endpoint.
pub struct Tcb {
    ctx: SiteContext,
    items: OnceCell<Vec<ChapterItem>>,
    title: OnceCell<String>,
}

impl Tcb {
    /// Creates the adapter for the series in `ctx`.
    #[must_use]
    pub fn new(ctx: SiteContext) -> Self {
        Self {
            ctx,
            items: OnceCell::new(),
            title: OnceCell::new(),
        }
    }

    fn chapters_endpoint(&self) -> Option<String> {
        let slug = SLUG_RE.captures(self.ctx.url.as_str())?.get(1)?.as_str();
        Some(format!("{}/manga/{slug}/ajax/chapters", self.base_url()))
    }

    async fn items(&self, endpoint: &str) -> Result<&Vec<ChapterItem>, SiteError> {
        self.items
            .get_or_try_init(|| async {
                let base = self.base_url();
                let body =
                    post_text(&self.ctx.client, Request::new(NAME, endpoint).referer(&base)).await?;
                parse_chapter_items(&body, endpoint)
            })
            .await
    }
}

impl std::fmt::Debug for Tcb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tcb")
            .field("url", &self.ctx.url.as_str())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Site for Tcb {
    fn name(&self) -> &'static str {
        NAME
    }

    fn context(&self) -> &SiteContext {
        &self.ctx
    }

    #[tracing::instrument(skip(self), fields(site = NAME))]
    async fn validate_url(&self) -> Result<bool, SiteError> {
        let Some(endpoint) = self.chapters_endpoint() else {
            return Ok(false);
        };
        Ok(!self.items(&endpoint).await?.is_empty())
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

    async fn fetch_chapters(&self) -> Result<Vec<ChapterEntry>, SiteError> {
        let Some(endpoint) = self.chapters_endpoint() else {
            return Err(SiteError::parse(
                NAME,
                self.ctx.url.as_str(),
                "URL does not match manga/<slug>/",
            ));
        };

        let chapters = self
            .items(&endpoint)
            .await?
            .iter()
            .filter_map(|item| {
                let Some(number) = first_number(&item.title) else {
                    warn!(title = %item.title, "skipping chapter without number");
                    return None;
                };
                Some(ChapterEntry::new(
                    number,
                    item.title.clone(),
                    ChapterLocator::Url(item.href.clone()),
                ))
            })
            .collect();
        Ok(chapters)
    }

    #[tracing::instrument(skip(self, entry), fields(site = NAME, chapter = entry.number))]
    async fn fetch_chapter(&self, entry: &ChapterEntry) -> Result<Chapter, SiteError> {
        let ChapterLocator::Url(url) = &entry.locator else {
            return Err(SiteError::unsupported_chapter(NAME, &entry.title));
        };

        let body = get_text(&self.ctx.client, Request::new(NAME, url)).await?;
        let sources = reading_images(&body, url)?;

        let mut pages = Vec::with_capacity(sources.len());
        for (index, source) in sources.into_iter().enumerate() {
            let number = u32::try_from(index + 1).unwrap_or(u32::MAX);
            if source.is_empty() {
                warn!(page = number, chapter = %entry.title, "page has no URL to fetch from, ignoring");
                continue;
            }
            match absolutize_url(&source, &self.ctx.url) {
                Some(image_url) => pages.push(Page::new(number, image_url)),
                None => warn!(page = number, chapter = %entry.title, "page has an invalid URL, ignoring"),
            }
        }

        let mut chapter = Chapter::from_entry(entry, pages);
        chapter.language = Some("en".to_string());
        Ok(chapter)
    }
}

fn parse_chapter_items(body: &str, url: &str) -> Result<Vec<ChapterItem>, SiteError> {
    let document = Html::parse_document(body);
    let item_selector = css(NAME, url, "li")?;
    let link_selector = css(NAME, url, "a")?;

    Ok(document
        .select(&item_selector)
        .map(|item| {
            let link = item.select(&link_selector).next();
            // the title is the link's own text, without badges nested in child elements
            let title = link
                .map(|a| {
                    a.children()
                        .filter_map(|node| node.value().as_text().map(|text| (**text).to_owned()))
                        .collect::<String>()
                })
                .unwrap_or_default();
            ChapterItem {
                title: title.trim().to_string(),
                href: link
                    .and_then(|a| a.value().attr("href"))
                    .unwrap_or_default()
                    .to_string(),
            }
        })
        .collect())
}

fn parse_title(body: &str, url: &str) -> Result<String, SiteError> {
    let document = Html::parse_document(body);
    let h1 = css(NAME, url, "h1")?;
    Ok(document
        .select(&h1)
        .flat_map(|el| el.text())
        .collect::<String>()
        .trim()
        .to_string())
}

fn reading_images(body: &str, url: &str) -> Result<Vec<String>, SiteError> {
    let document = Html::parse_document(body);
    let images = css(NAME, url, "div.reading-content img")?;
    Ok(document
        .select(&images)
        .map(|img| {
            img.value()
                .attr("data-src")
                .or_else(|| img.value().attr("src"))
                .unwrap_or_default()
                .trim()
                .to_string()
        })
        .collect())
}
