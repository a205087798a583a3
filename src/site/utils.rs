//! Shared helpers for site adapters: title cleanup, id extraction, URL joining
//! and static regexes.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Selector};
use url::Url;

use super::SiteError;

/// Compiles a regex at static init; panics on invalid pattern.
pub fn compile_static_regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid static regex '{pattern}': {e}"))
}

static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"\s+"));

static UUID_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r"[0-9A-Za-z]{8}(?:-[0-9A-Za-z]{4}){3}-[0-9A-Za-z]{12}")
});

/// Matches the first decimal number in a string, e.g. `10` or `10.5`.
pub static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"(\d+\.?\d*)"));

/// Collapses runs of whitespace into single spaces and trims.
#[must_use]
pub fn sanitize_title(title: &str) -> String {
    WHITESPACE_RE.replace_all(title, " ").trim().to_string()
}

/// Returns the first UUID-shaped id in `value`.
#[must_use]
pub fn find_uuid(value: &str) -> Option<String> {
    UUID_RE.find(value).map(|m| m.as_str().to_string())
}

/// Returns `scheme://host[:port]` of a URL.
#[must_use]
pub fn base_url(url: &Url) -> String {
    let mut base = format!("{}://{}", url.scheme(), url.host_str().unwrap_or_default());
    if let Some(port) = url.port() {
        base.push_str(&format!(":{port}"));
    }
    base
}

/// Resolves a possibly relative URL string against a base URL.
///
/// Returns the value as-is if it already starts with `http://` or `https://`;
/// normalizes `//...` to `https:...`; otherwise joins with `base_url`.
#[must_use]
pub fn absolutize_url(value: &str, base_url: &Url) -> Option<String> {
    if value.starts_with("http://") || value.starts_with("https://") {
        return Some(value.to_string());
    }
    if value.starts_with("//") {
        return Some(format!("https:{value}"));
    }
    base_url.join(value).ok().map(|url| url.to_string())
}

/// Parses a CSS selector, reporting failures as parse errors of `site`.
pub fn css(site: &'static str, url: &str, selector: &str) -> Result<Selector, SiteError> {
    Selector::parse(selector)
        .map_err(|e| SiteError::parse(site, url, format!("invalid selector '{selector}': {e}")))
}

/// Concatenated text of an element and its descendants.
#[must_use]
pub fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect()
}

/// Parses the first decimal number found in `value`.
#[must_use]
pub fn first_number(value: &str) -> Option<f64> {
    NUMBER_RE
        .captures(value)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
}
