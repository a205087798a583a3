use std::io::{self, BufRead, IsTerminal, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use manga_downloader::download::PipelineReport;
use manga_downloader::session::Session;
use manga_downloader::site::build_http_client;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::ProcessExit;
use crate::app::{config_manager, exit_handler, progress_manager, terminal};
use crate::cli::Args;

pub(crate) async fn run_downloader(args: Args) -> Result<ProcessExit> {
    let settings = Arc::new(config_manager::resolve_config(&args)?);
    debug!(?settings, "settings resolved");
    info!("Manga downloader starting");

    let client = build_http_client(settings.http).context("Failed to build HTTP client")?;
    let session = Session::open(&args.url, Arc::clone(&settings), client).await?;

    println!(
        "{} ({} chapters, {})",
        session.title(),
        session.chapters().len(),
        session.site_name()
    );

    if session.chapters().is_empty() {
        eprintln!("No chapters found for {}", args.url);
        return Ok(ProcessExit::Failure);
    }

    if args.ranges.is_none() && !args.yes {
        let question = format!(
            "Download all {} chapters of {}?",
            session.chapters().len(),
            session.title()
        );
        if !ask_confirmation(question).await? {
            info!("Download cancelled");
            return Ok(ProcessExit::Success);
        }
    }

    let selection = session.select(args.ranges.as_deref());
    if selection.is_empty() {
        eprintln!(
            "No chapters in range '{}'",
            args.ranges.as_deref().unwrap_or_default()
        );
        return Ok(ProcessExit::Failure);
    }
    info!(chapters = selection.len(), label = %selection.range_label(), "Chapters selected");

    let cancel = CancellationToken::new();
    let cancel_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping downloads");
            cancel_signal.cancel();
        }
    });

    let use_progress = progress_manager::should_use_progress(
        io::stderr().is_terminal(),
        args.quiet,
        terminal::is_dumb_terminal(),
    );
    let progress = progress_manager::progress_sink(use_progress, selection.len());

    let report = session.download(&selection, progress, cancel.clone()).await;

    print_completion_summary(&report, &settings.output_dir);

    if cancel.is_cancelled() || report.was_cancelled() {
        warn!(
            completed = report.chapters_completed,
            total = selection.len(),
            "Interrupted before all chapters finished"
        );
    }

    Ok(exit_handler::outcome_for_report(&report))
}

/// Asks `question` on stderr and reads the answer from stdin.
async fn ask_confirmation(question: String) -> Result<bool> {
    tokio::task::spawn_blocking(move || {
        confirm(&question, &mut io::stdin().lock(), &mut io::stderr())
    })
    .await
    .context("Confirmation prompt failed")?
    .context("Failed to read confirmation")
}

/// Returns true only for an explicit `y` or `yes` answer.
pub(crate) fn confirm(
    question: &str,
    input: &mut impl BufRead,
    output: &mut impl Write,
) -> io::Result<bool> {
    write!(output, "{question} [y/N] ")?;
    output.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(matches!(
        answer.trim().to_ascii_lowercase().as_str(),
        "y" | "yes"
    ))
}

fn print_completion_summary(report: &PipelineReport, output_dir: &Path) {
    println!(
        "Wrote {} archive(s) to {} ({} pages, {} failed)",
        report.archives_written(),
        output_dir.display(),
        report.pages_completed,
        report.pages_failed
    );

    if let Some(Ok(path)) = &report.bundle {
        println!("  bundle: {}", path.display());
    }
    if let Some(Err(error)) = &report.bundle {
        eprintln!("  bundle failed: {error}");
    }
    for failure in &report.failures {
        eprintln!("  {}", failure.error);
    }
}
