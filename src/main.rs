//! CLI entry point for manga-downloader.

use std::process::ExitCode;

use clap::Parser;
use tracing::debug;

mod app;
mod cli;

use cli::Args;

/// Process outcome mapped to the exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProcessExit {
    /// Every selected chapter was written (or the user declined).
    Success,
    /// Some chapters failed, at least one archive was written.
    Partial,
    /// Fatal error or nothing produced.
    Failure,
}

impl ProcessExit {
    pub(crate) fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Partial => 1,
            Self::Failure => 2,
        }
    }
}

impl From<ProcessExit> for ExitCode {
    fn from(exit: ProcessExit) -> Self {
        ExitCode::from(exit.code())
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse().with_url_first();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    app::terminal::init_tracing(app::terminal::resolve_default_log_level(
        args.quiet,
        args.verbose,
    ));
    debug!(?args, "CLI arguments parsed");

    match app::runtime::run_downloader(args).await {
        Ok(exit) => exit.into(),
        Err(error) => {
            eprintln!("Error: {error:#}");
            ProcessExit::Failure.into()
        }
    }
}
