//! Config file loading for CLI defaults.
//!
//! The file is a flat list of `key = value` lines. Strings are double-quoted,
//! `#` starts a comment outside strings. Unknown keys and out-of-range values
//! are errors naming the offending line.

use std::env;
use std::fs;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use manga_downloader::config::{MAX_CHAPTER_CONCURRENCY, MAX_PAGE_CONCURRENCY};

const TIMEOUT_RANGE: RangeInclusive<u64> = 1..=3600;

/// Defaults read from the config file. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct FileConfig {
    /// Directory receiving the archives.
    pub output_dir: Option<PathBuf>,
    /// Bundle selected chapters into one archive.
    pub bundle: Option<bool>,
    /// Chapters downloaded at the same time.
    pub concurrency: Option<u8>,
    /// Pages downloaded at the same time within a chapter.
    pub concurrency_pages: Option<u8>,
    /// Preferred chapter language.
    pub language: Option<String>,
    /// Archive filename template.
    pub filename_template: Option<String>,
    /// HTTP connect timeout in seconds.
    pub connect_timeout_secs: Option<u64>,
    /// HTTP total request timeout in seconds.
    pub read_timeout_secs: Option<u64>,
}

/// Resolves the default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/manga-downloader/config.toml`
/// 2. `$HOME/.config/manga-downloader/config.toml`
#[must_use]
pub(crate) fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("manga-downloader")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("manga-downloader")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads the config file.
///
/// An explicit path must exist. The default path is optional: a missing file
/// yields `None`.
pub(crate) fn load(explicit: Option<&Path>) -> Result<Option<FileConfig>> {
    if let Some(path) = explicit {
        return load_file_config(path).map(Some);
    }

    match resolve_default_config_path() {
        Some(path) if path.exists() => load_file_config(&path).map(Some),
        _ => Ok(None),
    }
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line_no = line_index + 1;
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!("Invalid config syntax on line {line_no}: expected key = value");
        };

        let key = raw_key.trim();
        let value = raw_value.trim();
        let invalid = || format!("Invalid `{key}` value on line {line_no}");

        match key {
            "output_dir" => {
                cfg.output_dir = Some(PathBuf::from(parse_string_literal(value).with_context(invalid)?));
            }
            "bundle" => {
                cfg.bundle = Some(parse_boolean(value).with_context(invalid)?);
            }
            "concurrency" => {
                let parsed = parse_integer_u8(value)
                    .and_then(|v| check_range(v, 1..=MAX_CHAPTER_CONCURRENCY))
                    .with_context(invalid)?;
                cfg.concurrency = Some(parsed);
            }
            "concurrency_pages" => {
                let parsed = parse_integer_u8(value)
                    .and_then(|v| check_range(v, 1..=MAX_PAGE_CONCURRENCY))
                    .with_context(invalid)?;
                cfg.concurrency_pages = Some(parsed);
            }
            "language" => {
                cfg.language = Some(parse_string_literal(value).with_context(invalid)?);
            }
            "filename_template" => {
                let parsed = parse_string_literal(value).with_context(invalid)?;
                if parsed.trim().is_empty() {
                    bail!("Invalid `filename_template` value on line {line_no}: template is empty");
                }
                cfg.filename_template = Some(parsed);
            }
            "connect_timeout_secs" => {
                let parsed = parse_integer_u64(value)
                    .and_then(|v| check_range(v, TIMEOUT_RANGE))
                    .with_context(invalid)?;
                cfg.connect_timeout_secs = Some(parsed);
            }
            "read_timeout_secs" => {
                let parsed = parse_integer_u64(value)
                    .and_then(|v| check_range(v, TIMEOUT_RANGE))
                    .with_context(invalid)?;
                cfg.read_timeout_secs = Some(parsed);
            }
            unknown => {
                bail!("Unknown configuration key: '{unknown}' on line {line_no}");
            }
        }
    }
    Ok(cfg)
}

fn check_range<T>(value: T, range: RangeInclusive<T>) -> Result<T>
where
    T: PartialOrd + std::fmt::Display,
{
    if !range.contains(&value) {
        bail!(
            "{value} is out of range. Expected range: {}..={}",
            range.start(),
            range.end()
        );
    }
    Ok(value)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    if raw_value.len() < 2 || !raw_value.starts_with('"') || !raw_value.ends_with('"') {
        bail!("Expected double-quoted string");
    }
    Ok(raw_value[1..raw_value.len() - 1].to_string())
}

fn parse_integer_u8(raw_value: &str) -> Result<u8> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<u16>()?;
    u8::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u8"))
}

fn parse_integer_u64(raw_value: &str) -> Result<u64> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<i128>()?;
    if value < 0 {
        bail!("Expected non-negative integer");
    }
    u64::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u64"))
}

fn parse_boolean(raw_value: &str) -> Result<bool> {
    match raw_value.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => bail!("Expected 'true' or 'false'"),
    }
}
