//! Exit code logic for the downloader process.
//!
//! Single responsibility: map the pipeline report to the process exit outcome.

use manga_downloader::download::PipelineReport;

use crate::ProcessExit;

/// Determines the process exit outcome from written archives and failed
/// chapters.
pub(crate) fn determine_exit_outcome(written: usize, failed: usize) -> ProcessExit {
    if failed == 0 {
        ProcessExit::Success
    } else if written > 0 {
        ProcessExit::Partial
    } else {
        ProcessExit::Failure
    }
}

/// Exit outcome for a finished run. A failed bundle counts as a failure.
pub(crate) fn outcome_for_report(report: &PipelineReport) -> ProcessExit {
    let bundle_failed = usize::from(matches!(report.bundle, Some(Err(_))));
    determine_exit_outcome(report.archives_written(), report.failures.len() + bundle_failed)
}
