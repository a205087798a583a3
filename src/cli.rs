//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

/// Download manga chapters into CBZ archives.
///
/// Give the series URL and optionally the chapters to fetch, as a comma
/// separated list of numbers and inclusive ranges ("1-10,12,15-20"), in
/// either order. Without ranges every chapter is downloaded after a
/// confirmation.
#[derive(Parser, Debug)]
#[command(name = "manga-downloader")]
#[command(author, version, about)]
pub struct Args {
    /// Series URL on a supported site
    #[arg(value_name = "URL")]
    pub url: String,

    /// Chapters to download, e.g. "1-10,12" (default: all, after confirmation)
    #[arg(value_name = "RANGES")]
    pub ranges: Option<String>,

    /// Pack every selected chapter into a single archive
    #[arg(short, long)]
    pub bundle: bool,

    /// Chapters downloaded at the same time (1-5)
    #[arg(short = 'c', long, value_parser = clap::value_parser!(u8).range(1..=5))]
    pub concurrency: Option<u8>,

    /// Pages downloaded at the same time within a chapter (1-10)
    #[arg(short = 'C', long, value_parser = clap::value_parser!(u8).range(1..=10))]
    pub concurrency_pages: Option<u8>,

    /// Preferred chapter language, e.g. "en" or "es" (defaults to "en", empty for any)
    #[arg(short, long)]
    pub language: Option<String>,

    /// Archive filename template using {Series}, {Number} and {Title}
    #[arg(short = 't', long)]
    pub filename_template: Option<String>,

    /// Directory receiving the archives (created when missing)
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Download every chapter without asking when no ranges are given
    #[arg(short, long)]
    pub yes: bool,

    /// HTTP connect timeout in seconds (1-3600)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub connect_timeout: Option<u64>,

    /// HTTP total request timeout in seconds (1-3600)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub read_timeout: Option<u64>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Config file (default: $XDG_CONFIG_HOME/manga-downloader/config.toml)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

impl Args {
    /// Puts the URL first when it was given after the ranges.
    #[must_use]
    pub fn with_url_first(mut self) -> Self {
        if let Some(ranges) = self.ranges.as_mut()
            && looks_like_url(ranges)
            && !looks_like_url(&self.url)
        {
            std::mem::swap(&mut self.url, ranges);
        }
        self
    }
}

fn looks_like_url(value: &str) -> bool {
    value.trim_start().to_ascii_lowercase().starts_with("http")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const URL: &str = "https://mangadex.org/title/abc";

    #[test]
    fn test_cli_url_only_parses_with_defaults() {
        let args = Args::try_parse_from(["manga-downloader", URL]).unwrap();
        assert_eq!(args.url, URL);
        assert!(args.ranges.is_none());
        assert!(!args.bundle);
        assert!(!args.yes);
        assert_eq!(args.concurrency, None);
        assert_eq!(args.concurrency_pages, None);
        assert_eq!(args.verbose, 0);
        assert!(!args.quiet);
    }

    #[test]
    fn test_cli_missing_url_is_error() {
        let err = Args::try_parse_from(["manga-downloader"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_cli_ranges_positional() {
        let args = Args::try_parse_from(["manga-downloader", URL, "1-3,10"]).unwrap();
        assert_eq!(args.ranges.as_deref(), Some("1-3,10"));
    }

    #[test]
    fn test_cli_ranges_before_url_are_swapped() {
        let args = Args::try_parse_from(["manga-downloader", "10-20", URL, "--bundle"])
            .unwrap()
            .with_url_first();
        assert_eq!(args.url, URL);
        assert_eq!(args.ranges.as_deref(), Some("10-20"));
        assert!(args.bundle);
    }

    #[test]
    fn test_cli_url_first_left_alone() {
        let args = Args::try_parse_from(["manga-downloader", URL, "1-3"]).unwrap().with_url_first();
        assert_eq!(args.url, URL);
        assert_eq!(args.ranges.as_deref(), Some("1-3"));

        let args = Args::try_parse_from(["manga-downloader", URL]).unwrap().with_url_first();
        assert_eq!(args.url, URL);
        assert_eq!(args.ranges, None);
    }

    #[test]
    fn test_cli_two_non_urls_keep_order() {
        let args = Args::try_parse_from(["manga-downloader", "1-3", "5"]).unwrap().with_url_first();
        assert_eq!(args.url, "1-3");
        assert_eq!(args.ranges.as_deref(), Some("5"));
    }

    #[test]
    fn test_cli_short_flags() {
        let args = Args::try_parse_from([
            "manga-downloader",
            "-b",
            "-c",
            "2",
            "-C",
            "8",
            "-l",
            "es",
            "-t",
            "{Series} {Number}",
            "-o",
            "out",
            "-y",
            URL,
        ])
        .unwrap();
        assert!(args.bundle);
        assert_eq!(args.concurrency, Some(2));
        assert_eq!(args.concurrency_pages, Some(8));
        assert_eq!(args.language.as_deref(), Some("es"));
        assert_eq!(args.filename_template.as_deref(), Some("{Series} {Number}"));
        assert_eq!(args.output_dir, Some(PathBuf::from("out")));
        assert!(args.yes);
    }

    #[test]
    fn test_cli_concurrency_above_ceiling_rejected() {
        let err = Args::try_parse_from(["manga-downloader", "-c", "6", URL]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);

        let err = Args::try_parse_from(["manga-downloader", "-C", "11", URL]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_concurrency_zero_rejected() {
        let err = Args::try_parse_from(["manga-downloader", "-c", "0", URL]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_timeouts() {
        let args = Args::try_parse_from([
            "manga-downloader",
            "--connect-timeout",
            "5",
            "--read-timeout",
            "60",
            URL,
        ])
        .unwrap();
        assert_eq!(args.connect_timeout, Some(5));
        assert_eq!(args.read_timeout, Some(60));
    }

    #[test]
    fn test_cli_verbose_flag_increments_count() {
        let args = Args::try_parse_from(["manga-downloader", "-vv", URL]).unwrap();
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let err = Args::try_parse_from(["manga-downloader", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_cli_version_flag_shows_version() {
        let err = Args::try_parse_from(["manga-downloader", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }

    #[test]
    fn test_cli_config_path() {
        let args = Args::try_parse_from(["manga-downloader", "--config", "/tmp/c.toml", URL]).unwrap();
        assert_eq!(args.config, Some(PathBuf::from("/tmp/c.toml")));
    }
}
