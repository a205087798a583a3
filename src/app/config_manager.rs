//! Configuration lifecycle: load the config file and merge CLI overrides into
//! the run settings.

use anyhow::Result;
use manga_downloader::config::{
    DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_FILENAME_TEMPLATE, DEFAULT_LANGUAGE,
    DEFAULT_READ_TIMEOUT_SECS,
    HttpTimeouts, MAX_CHAPTER_CONCURRENCY, MAX_PAGE_CONCURRENCY, MaxConcurrency, Settings,
};

use crate::app::config_file::{self, FileConfig};
use crate::cli::Args;

/// Loads the config file (explicit `--config` or default location) and
/// resolves the run settings.
pub(crate) fn resolve_config(args: &Args) -> Result<Settings> {
    let file_config = config_file::load(args.config.as_deref())?;
    Ok(resolve_settings(args, file_config.as_ref()))
}

/// Merges settings with precedence CLI flag > config file > default.
pub(crate) fn resolve_settings(args: &Args, file: Option<&FileConfig>) -> Settings {
    let file = file.cloned().unwrap_or_default();

    let chapters = args
        .concurrency
        .or(file.concurrency)
        .unwrap_or(MAX_CHAPTER_CONCURRENCY);
    let pages = args
        .concurrency_pages
        .or(file.concurrency_pages)
        .unwrap_or(MAX_PAGE_CONCURRENCY);

    Settings {
        bundle: args.bundle || file.bundle.unwrap_or(false),
        max_concurrency: MaxConcurrency::clamped(chapters, pages),
        language: Some(
            args.language
                .clone()
                .or(file.language)
                .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
        ),
        filename_template: args
            .filename_template
            .clone()
            .or(file.filename_template)
            .unwrap_or_else(|| DEFAULT_FILENAME_TEMPLATE.to_string()),
        output_dir: args
            .output_dir
            .clone()
            .or(file.output_dir)
            .unwrap_or_else(|| ".".into()),
        http: HttpTimeouts {
            connect_secs: args
                .connect_timeout
                .or(file.connect_timeout_secs)
                .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
            read_secs: args
                .read_timeout
                .or(file.read_timeout_secs)
                .unwrap_or(DEFAULT_READ_TIMEOUT_SECS),
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::path::PathBuf;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["manga-downloader"];
        argv.extend_from_slice(extra);
        argv.push("https://mangadex.org/title/abc");
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_resolve_settings_defaults() {
        let settings = resolve_settings(&args(&[]), None);
        assert!(!settings.bundle);
        assert_eq!(settings.max_concurrency, MaxConcurrency::default());
        assert_eq!(settings.filename_template, DEFAULT_FILENAME_TEMPLATE);
        assert_eq!(settings.output_dir, PathBuf::from("."));
        assert_eq!(settings.http, HttpTimeouts::default());
        assert_eq!(settings.language.as_deref(), Some(DEFAULT_LANGUAGE));
    }

    #[test]
    fn test_blank_language_flag_disables_filter() {
        let settings = resolve_settings(&args(&["--language", ""]), None);
        assert_eq!(settings.language.as_deref(), Some(""));
        assert_eq!(settings.preferred_language(), None);
    }

    #[test]
    fn test_resolve_settings_file_over_defaults() {
        let file = FileConfig {
            bundle: Some(true),
            concurrency: Some(2),
            language: Some("es".to_string()),
            output_dir: Some(PathBuf::from("/tmp/manga")),
            read_timeout_secs: Some(30),
            ..FileConfig::default()
        };
        let settings = resolve_settings(&args(&[]), Some(&file));
        assert!(settings.bundle);
        assert_eq!(settings.max_concurrency.chapters, 2);
        assert_eq!(settings.max_concurrency.pages, MAX_PAGE_CONCURRENCY);
        assert_eq!(settings.language.as_deref(), Some("es"));
        assert_eq!(settings.output_dir, PathBuf::from("/tmp/manga"));
        assert_eq!(settings.http.read_secs, 30);
    }

    #[test]
    fn test_resolve_settings_cli_over_file() {
        let file = FileConfig {
            concurrency: Some(2),
            concurrency_pages: Some(3),
            language: Some("es".to_string()),
            filename_template: Some("{Series}".to_string()),
            ..FileConfig::default()
        };
        let settings = resolve_settings(
            &args(&["-c", "4", "-C", "9", "-l", "en", "-t", "{Number}"]),
            Some(&file),
        );
        assert_eq!(settings.max_concurrency, MaxConcurrency { chapters: 4, pages: 9 });
        assert_eq!(settings.language.as_deref(), Some("en"));
        assert_eq!(settings.filename_template, "{Number}");
    }

    #[test]
    fn test_resolve_config_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "concurrency_pages = 4\n").unwrap();
        let path_arg = path.to_string_lossy().to_string();
        let settings = resolve_config(&args(&["--config", &path_arg])).unwrap();
        assert_eq!(settings.max_concurrency.pages, 4);
    }
}
