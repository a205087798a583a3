//! Shared User-Agent string for site and image requests.
//!
//! Several comic hosts reject requests without a browser-like agent, so one
//! browser-compatible string is sent everywhere, tagged with the tool version.

/// Browser token prefix accepted by the supported sites.
const BROWSER_UA_PREFIX: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Default User-Agent for every outbound request.
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("{BROWSER_UA_PREFIX} manga-downloader/{version}")
}
