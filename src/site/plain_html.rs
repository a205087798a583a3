//! Adapter for plain HTML sites whose chapter list and page images are found
//! with CSS selectors.
//!
//! Known layouts are tried in order, since several sites use very similar
//! markup; the first layout whose chapter rows match the index page wins.
//! Selector sets are never merged into one `,`-joined query because that
//! would mix rows from different layouts.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use scraper::{ElementRef, Html};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::models::{Chapter, ChapterEntry, ChapterLocator, Page};

use super::http::{Request, get_text};
use super::utils::{absolutize_url, compile_static_regex, css, element_text, sanitize_title};
use super::{Site, SiteContext, SiteError};

const NAME: &str = "plain-html";

/// Upper bound on followed ajax listing pages.
const MAX_AJAX_PAGES: u32 = 500;

static CHAPTER_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"Chapter\s*(\d+\.?\d*)"));

/// Ajax pagination selectors for sites that load the chapter list in pages.
#[derive(Debug)]
struct AjaxSelectors {
    /// Present on the index page when the list is paginated.
    trigger: &'static str,
    /// Chapter rows inside one ajax page.
    rows: &'static str,
    /// Present when another ajax page follows.
    next: &'static str,
}

/// CSS selectors describing one site layout.
#[derive(Debug)]
struct SiteSelector {
    name: &'static str,
    title: &'static str,
    rows: &'static str,
    chapter: &'static str,
    chapter_title: &'static str,
    /// Link inside the row; `None` means the row itself is the link.
    link: Option<&'static str>,
    image: &'static str,
    ajax: Option<AjaxSelectors>,
}

static SELECTORS: &[SiteSelector] = &[
    SiteSelector {
        name: "tcbscans",
        title: "h1",
        rows: "main .mx-auto .grid .col-span-2 a",
        chapter: ".font-bold",
        chapter_title: ".text-gray-500",
        link: None,
        image: "picture img",
        ajax: None,
    },
    SiteSelector {
        name: "manganato",
        title: "h1",
        rows: "div.panel-story-chapter-list .row-content-chapter li",
        chapter: "a",
        chapter_title: "a",
        link: Some("a"),
        image: "div.container-chapter-reader img",
        ajax: None,
    },
    SiteSelector {
        name: "manganelos",
        title: "h1",
        rows: "#examples div.chapter-list .row",
        chapter: "a",
        chapter_title: "a",
        link: Some("a"),
        image: "div.container-chapter-reader img",
        ajax: None,
    },
    SiteSelector {
        name: "mangakakalot",
        title: "h1",
        rows: "div.chapter-list .row",
        chapter: "a",
        chapter_title: "a",
        link: Some("a"),
        image: "div.container-chapter-reader img,#vungdoc img",
        ajax: None,
    },
    SiteSelector {
        name: "asuratoon",
        title: "h1",
        rows: "#chapterlist ul li",
        chapter: ".chapternum",
        chapter_title: ".chapternum",
        link: Some("a"),
        image: "#readerarea img.ts-main-image",
        ajax: None,
    },
    SiteSelector {
        name: "mangajar",
        title: "h1 .post-name",
        rows: "article.chaptersList li.chapter-item",
        chapter: ".chapter-title",
        chapter_title: "a",
        link: Some("a"),
        image: "#chapter-slider .carousel-item img",
        ajax: Some(AjaxSelectors {
            trigger: ".chapters-infinite-pagination .pagination .page-item",
            rows: ".chapter-list-container .chapter-item",
            next: "ul.pagination .page-item:not(.disabled):last-child",
        }),
    },
    SiteSelector {
        name: "mangamonks",
        title: "h3.info-title",
        rows: "#chapter .chapter-list li",
        chapter: ".chapter-number",
        chapter_title: ".chapter-number",
        link: Some("a"),
        image: "#imageContainer img",
        ajax: None,
    },
];

/// One chapter row scraped from a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Row {
    label: String,
    title: String,
    href: String,
}

/// Index page state discovered while validating.
#[derive(Debug)]
struct Listing {
    layout: Option<&'static SiteSelector>,
    title: String,
    rows: Vec<Row>,
}

/// Adapter for selector-driven plain HTML sites.
pub struct PlainHtml {
    ctx: SiteContext,
    listing: OnceCell<Listing>,
}

impl PlainHtml {
    /// Creates the adapter for the series in `ctx`.
    #[must_use]
    pub fn new(ctx: SiteContext) -> Self {
        Self {
            ctx,
            listing: OnceCell::new(),
        }
    }

    async fn listing(&self) -> Result<&Listing, SiteError> {
        self.listing.get_or_try_init(|| self.load_listing()).await
    }

    async fn load_listing(&self) -> Result<Listing, SiteError> {
        let url = self.ctx.url.as_str();
        let body = get_text(&self.ctx.client, Request::new(NAME, url)).await?;
        let index = parse_index(&body, url)?;

        let Some(layout) = index.layout else {
            return Ok(Listing {
                layout: None,
                title: String::new(),
                rows: Vec::new(),
            });
        };
        debug!(layout = layout.name, rows = index.rows.len(), "Matched site layout");

        let rows = match (&layout.ajax, index.paginated) {
            (Some(ajax), true) => self.load_ajax_rows(layout, ajax).await,
            _ => index.rows,
        };

        Ok(Listing {
            layout: Some(layout),
            title: index.title,
            rows,
        })
    }

    async fn load_ajax_rows(&self, layout: &SiteSelector, ajax: &AjaxSelectors) -> Vec<Row> {
        let list_url = format!("{}/chaptersList", self.ctx.url.as_str().trim_end_matches('/'));
        let mut rows = Vec::new();

        for page in 1..=MAX_AJAX_PAGES {
            let page_url = format!("{list_url}?page={page}");
            let body = match get_text(&self.ctx.client, Request::new(NAME, &page_url)).await {
                Ok(body) => body,
                Err(error) => {
                    warn!(page, error = %error, "stopping chapter list pagination");
                    break;
                }
            };
            match parse_ajax_page(&body, &page_url, layout, ajax) {
                Ok((page_rows, has_next)) => {
                    rows.extend(page_rows);
                    if !has_next {
                        break;
                    }
                }
                Err(error) => {
                    warn!(page, error = %error, "stopping chapter list pagination");
                    break;
                }
            }
        }

        rows
    }
}

impl std::fmt::Debug for PlainHtml {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlainHtml")
            .field("url", &self.ctx.url.as_str())
            .field("layout", &self.listing.get().and_then(|l| l.layout).map(|l| l.name))
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Site for PlainHtml {
    fn name(&self) -> &'static str {
        NAME
    }

    fn context(&self) -> &SiteContext {
        &self.ctx
    }

    #[tracing::instrument(skip(self), fields(site = NAME))]
    async fn validate_url(&self) -> Result<bool, SiteError> {
        let listing = self.listing().await?;
        Ok(listing.layout.is_some() && !listing.rows.is_empty())
    }

    async fn fetch_title(&self) -> Result<String, SiteError> {
        Ok(sanitize_title(&self.listing().await?.title))
    }

    async fn fetch_chapters(&self) -> Result<Vec<ChapterEntry>, SiteError> {
        let listing = self.listing().await?;
        Ok(listing
            .rows
            .iter()
            .filter_map(|row| chapter_from_row(row, &self.ctx))
            .collect())
    }

    #[tracing::instrument(skip(self, entry), fields(site = NAME, chapter = entry.number))]
    async fn fetch_chapter(&self, entry: &ChapterEntry) -> Result<Chapter, SiteError> {
        let ChapterLocator::Url(url) = &entry.locator else {
            return Err(SiteError::unsupported_chapter(NAME, &entry.title));
        };
        let Some(layout) = self.listing().await?.layout else {
            return Err(SiteError::parse(NAME, url, "site layout was never identified"));
        };

        let body = get_text(&self.ctx.client, Request::new(NAME, url)).await?;
        let sources = image_sources(&body, url, layout.image)?;
        let pages = pages_from_sources(&sources, &self.ctx, &entry.title);

        let mut chapter = Chapter::from_entry(entry, pages);
        chapter.language = Some("en".to_string());
        Ok(chapter)
    }
}

/// Outcome of parsing the series index page.
struct IndexPage {
    layout: Option<&'static SiteSelector>,
    title: String,
    rows: Vec<Row>,
    paginated: bool,
}

fn parse_index(body: &str, url: &str) -> Result<IndexPage, SiteError> {
    let document = Html::parse_document(body);

    for layout in SELECTORS {
        let rows_selector = css(NAME, url, layout.rows)?;
        let rows: Vec<ElementRef<'_>> = document.select(&rows_selector).collect();
        if rows.is_empty() {
            continue;
        }

        let title_selector = css(NAME, url, layout.title)?;
        let title = document
            .select(&title_selector)
            .map(element_text)
            .collect::<String>();
        let paginated = match &layout.ajax {
            Some(ajax) => document.select(&css(NAME, url, ajax.trigger)?).next().is_some(),
            None => false,
        };

        return Ok(IndexPage {
            layout: Some(layout),
            title,
            rows: extract_rows(rows, layout, url)?,
            paginated,
        });
    }

    Ok(IndexPage {
        layout: None,
        title: String::new(),
        rows: Vec::new(),
        paginated: false,
    })
}

fn parse_ajax_page(
    body: &str,
    url: &str,
    layout: &SiteSelector,
    ajax: &AjaxSelectors,
) -> Result<(Vec<Row>, bool), SiteError> {
    let document = Html::parse_document(body);
    let rows: Vec<ElementRef<'_>> = document.select(&css(NAME, url, ajax.rows)?).collect();
    let has_next = document.select(&css(NAME, url, ajax.next)?).next().is_some();
    Ok((extract_rows(rows, layout, url)?, has_next))
}

fn extract_rows(
    rows: Vec<ElementRef<'_>>,
    layout: &SiteSelector,
    url: &str,
) -> Result<Vec<Row>, SiteError> {
    let chapter_selector = css(NAME, url, layout.chapter)?;
    let title_selector = css(NAME, url, layout.chapter_title)?;
    let link_selector = layout.link.map(|link| css(NAME, url, link)).transpose()?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let href = match &link_selector {
                Some(selector) => row
                    .select(selector)
                    .next()
                    .and_then(|link| link.value().attr("href")),
                None => row.value().attr("href"),
            };
            Row {
                label: row.select(&chapter_selector).map(element_text).collect(),
                title: row.select(&title_selector).map(element_text).collect(),
                href: href.unwrap_or_default().to_string(),
            }
        })
        .collect())
}

fn chapter_from_row(row: &Row, ctx: &SiteContext) -> Option<ChapterEntry> {
    // rows without a chapter number are usually site announcements
    let captures = CHAPTER_NUMBER_RE.captures(&row.label)?;
    let raw = captures.get(1)?.as_str();
    let number = match raw.parse::<f64>() {
        Ok(number) => number,
        Err(error) => {
            warn!(label = %row.label, error = %error, "skipping chapter with unreadable number");
            return None;
        }
    };
    let Some(link) = absolutize_url(row.href.trim(), &ctx.url) else {
        warn!(label = %row.label, href = %row.href, "skipping chapter with invalid link");
        return None;
    };

    Some(ChapterEntry::new(number, row.title.clone(), ChapterLocator::Url(link)))
}

fn image_sources(body: &str, url: &str, image_selector: &str) -> Result<Vec<String>, SiteError> {
    let document = Html::parse_document(body);

    // some sites keep a comma separated list of image urls in a hidden layer
    let array_data: Vec<ElementRef<'_>> = document.select(&css(NAME, url, "#arraydata")?).collect();
    if let [single] = array_data.as_slice() {
        return Ok(element_text(*single)
            .split(',')
            .map(|src| src.trim().to_string())
            .collect());
    }

    Ok(document
        .select(&css(NAME, url, image_selector)?)
        .map(|img| {
            let src = img.value().attr("src").unwrap_or_default();
            if src.is_empty() || src.starts_with("data:image") {
                img.value().attr("data-src").unwrap_or_default().trim().to_string()
            } else {
                src.trim().to_string()
            }
        })
        .collect())
}

fn pages_from_sources(sources: &[String], ctx: &SiteContext, chapter_title: &str) -> Vec<Page> {
    let mut pages = Vec::with_capacity(sources.len());
    for (index, source) in sources.iter().enumerate() {
        let number = u32::try_from(index + 1).unwrap_or(u32::MAX);
        if source.is_empty() {
            warn!(page = number, chapter = chapter_title, "page has no URL to fetch from, ignoring");
            continue;
        }
        match absolutize_url(source, &ctx.url) {
            Some(url) => pages.push(Page::new(number, url)),
            None => warn!(
                page = number,
                chapter = chapter_title,
                source = %source,
                "page has an invalid URL, ignoring"
            ),
        }
    }
    pages
}
