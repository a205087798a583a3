//! Integration tests for the concurrent fetch pipeline.
//!
//! These tests drive FetchPipeline with an in-memory site and a scripted page
//! fetcher (latency, failures, in-flight accounting) and inspect the CBZ
//! archives written to a temporary directory.

use std::sync::Arc;
use std::time::Duration;

use manga_downloader::download::{ChapterError, FetchPipeline, ProgressEvent};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

mod support;
use support::fakes::{FakeSite, RecordingProgress, ScriptedFetcher, read_cbz, settings};

fn page_url(chapter: u32, page: u32) -> String {
    format!("https://cdn.example/c{chapter}-p{page}.jpg")
}

// ==================== Ordering ====================

#[tokio::test]
async fn test_pages_archived_in_page_order_under_inverted_latency() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let settings = Arc::new(settings(dir.path(), 1, 10, false));
    let site = FakeSite::new(Arc::clone(&settings)).chapter(1.0, 6);
    let entries = site.entries();

    // later pages finish first
    let mut fetcher = ScriptedFetcher::new();
    for page in 1..=6 {
        fetcher = fetcher.delay(&page_url(1, page), Duration::from_millis(u64::from(7 - page) * 25));
    }

    let pipeline = FetchPipeline::new(Arc::new(site), Arc::new(fetcher), settings);
    let report = pipeline.run("Series", entries, "1").await;

    assert!(report.is_success(), "failures: {:?}", report.failures);
    assert_eq!(report.archives, vec![dir.path().join("Series 1.cbz")]);

    let entries = read_cbz(&report.archives[0]);
    let expected: Vec<(String, String)> = (1..=6)
        .map(|page| (format!("{:03}.jpg", page - 1), page_url(1, page)))
        .collect();
    assert_eq!(entries, expected);
    Ok(())
}

#[tokio::test]
async fn test_archives_reported_in_chapter_order() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let settings = Arc::new(settings(dir.path(), 5, 10, false));
    let site = FakeSite::new(Arc::clone(&settings))
        .chapter(1.0, 1)
        .chapter(2.0, 1)
        .chapter(3.0, 1);
    let entries = site.entries();
    let fetcher = ScriptedFetcher::new()
        .delay(&page_url(1, 1), Duration::from_millis(90))
        .delay(&page_url(2, 1), Duration::from_millis(45));

    let report = FetchPipeline::new(Arc::new(site), Arc::new(fetcher), settings)
        .run("Series", entries, "1-3")
        .await;

    assert_eq!(
        report.archives,
        vec![
            dir.path().join("Series 1.cbz"),
            dir.path().join("Series 2.cbz"),
            dir.path().join("Series 3.cbz"),
        ]
    );
    assert_eq!(report.chapters_completed, 3);
    Ok(())
}

// ==================== Concurrency ceilings ====================

#[tokio::test]
async fn test_in_flight_pages_never_exceed_ceiling() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let settings = Arc::new(settings(dir.path(), 1, 3, false));
    let site = FakeSite::new(Arc::clone(&settings)).chapter(1.0, 40);
    let entries = site.entries();
    let fetcher = Arc::new(ScriptedFetcher::new().default_delay(Duration::from_millis(5)));

    let report = FetchPipeline::new(Arc::new(site), fetcher.clone(), settings)
        .run("Series", entries, "1")
        .await;

    assert!(report.is_success());
    assert_eq!(fetcher.calls(), 40);
    assert!(fetcher.max_in_flight() <= 3, "max in flight: {}", fetcher.max_in_flight());
    assert!(fetcher.max_in_flight() >= 1);
    Ok(())
}

#[tokio::test]
async fn test_chapter_ceiling_bounds_total_fetches() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    // 2 chapters at a time, 1 page each at a time: never more than 2 fetches
    let settings = Arc::new(settings(dir.path(), 2, 1, false));
    let mut site = FakeSite::new(Arc::clone(&settings));
    for number in 1..=6 {
        site = site.chapter(f64::from(number), 4);
    }
    let entries = site.entries();
    let fetcher = Arc::new(ScriptedFetcher::new().default_delay(Duration::from_millis(5)));

    let report = FetchPipeline::new(Arc::new(site), fetcher.clone(), settings)
        .run("Series", entries, "1-6")
        .await;

    assert_eq!(report.archives_written(), 6);
    assert_eq!(report.pages_completed, 24);
    assert!(fetcher.max_in_flight() <= 2, "max in flight: {}", fetcher.max_in_flight());
    Ok(())
}

// ==================== Failure containment ====================

#[tokio::test]
async fn test_one_failed_page_leaves_archive_with_remaining_pages() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let settings = Arc::new(settings(dir.path(), 1, 4, false));
    let site = FakeSite::new(Arc::clone(&settings)).chapter(7.0, 5);
    let entries = site.entries();
    let fetcher = ScriptedFetcher::new().fail(&page_url(7, 3));

    let report = FetchPipeline::new(Arc::new(site), Arc::new(fetcher), settings)
        .run("Series", entries, "7")
        .await;

    assert!(report.failures.is_empty());
    assert_eq!(report.pages_failed, 1);
    assert_eq!(report.pages_completed, 4);

    let names: Vec<String> = read_cbz(&report.archives[0]).into_iter().map(|(name, _)| name).collect();
    assert_eq!(names, vec!["000.jpg", "001.jpg", "002.jpg", "003.jpg"]);
    let contents: Vec<String> = read_cbz(&report.archives[0]).into_iter().map(|(_, body)| body).collect();
    assert!(!contents.contains(&page_url(7, 3)));
    Ok(())
}

#[tokio::test]
async fn test_chapter_without_pages_is_skipped() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let settings = Arc::new(settings(dir.path(), 2, 2, false));
    let site = FakeSite::new(Arc::clone(&settings)).chapter(1.0, 2).chapter(2.0, 0);
    let entries = site.entries();

    let report = FetchPipeline::new(Arc::new(site), Arc::new(ScriptedFetcher::new()), settings)
        .run("Series", entries, "1-2")
        .await;

    assert_eq!(report.archives, vec![dir.path().join("Series 1.cbz")]);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].number, 2.0);
    assert!(matches!(report.failures[0].error, ChapterError::NoPages { .. }));
    assert!(!dir.path().join("Series 2.cbz").exists());
    Ok(())
}

#[tokio::test]
async fn test_chapters_with_same_name_get_versioned_archives() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let settings = Arc::new(settings(dir.path(), 2, 3, false));
    // two uploads of chapter 1 render to the same file name
    let site = FakeSite::new(Arc::clone(&settings)).chapter(1.0, 3).chapter(1.0, 3);
    let entries = site.entries();

    let report = FetchPipeline::new(Arc::new(site), Arc::new(ScriptedFetcher::new()), settings)
        .run("Series", entries, "1")
        .await;

    assert!(report.is_success(), "failures: {:?}", report.failures);
    let mut archives = report.archives.clone();
    archives.sort();
    assert_eq!(
        archives,
        vec![dir.path().join("Series 1 v2.cbz"), dir.path().join("Series 1.cbz")]
    );

    let on_disk = std::fs::read_dir(dir.path())?.count();
    assert_eq!(on_disk, report.archives_written());
    for archive in &report.archives {
        assert_eq!(read_cbz(archive).len(), 3);
    }
    Ok(())
}

#[tokio::test]
async fn test_chapter_with_every_page_failed_writes_nothing() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let settings = Arc::new(settings(dir.path(), 1, 2, false));
    let site = FakeSite::new(Arc::clone(&settings)).chapter(3.0, 2);
    let entries = site.entries();
    let fetcher = ScriptedFetcher::new().fail(&page_url(3, 1)).fail(&page_url(3, 2));

    let report = FetchPipeline::new(Arc::new(site), Arc::new(fetcher), settings)
        .run("Series", entries, "3")
        .await;

    assert!(report.archives.is_empty());
    assert!(matches!(
        report.failures[0].error,
        ChapterError::AllPagesFailed { failed: 2, .. }
    ));
    assert_eq!(std::fs::read_dir(dir.path())?.count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_unresolvable_chapter_does_not_affect_siblings() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let settings = Arc::new(settings(dir.path(), 3, 2, false));
    let site = FakeSite::new(Arc::clone(&settings))
        .chapter(1.0, 1)
        .broken_chapter(2.0)
        .chapter(3.0, 1);
    let entries = site.entries();

    let report = FetchPipeline::new(Arc::new(site), Arc::new(ScriptedFetcher::new()), settings)
        .run("Series", entries, "1-3")
        .await;

    assert_eq!(report.archives.len(), 2);
    assert_eq!(report.failures.len(), 1);
    assert!(matches!(report.failures[0].error, ChapterError::Resolve { .. }));
    assert!(!report.is_success());
    Ok(())
}

// ==================== Bundle ====================

#[tokio::test]
async fn test_bundle_concatenates_chapters_in_number_order() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let settings = Arc::new(settings(dir.path(), 2, 2, true));
    let site = FakeSite::new(Arc::clone(&settings)).chapter(1.0, 2).chapter(2.0, 1);
    let entries = site.entries();
    // chapter 1 finishes last
    let fetcher = ScriptedFetcher::new()
        .delay(&page_url(1, 1), Duration::from_millis(60))
        .delay(&page_url(1, 2), Duration::from_millis(30));

    let report = FetchPipeline::new(Arc::new(site), Arc::new(fetcher), settings)
        .run("Series", entries, "1-2")
        .await;

    assert!(report.archives.is_empty());
    let bundle = report.bundle.as_ref().unwrap().as_ref().unwrap();
    assert_eq!(bundle, &dir.path().join("Series 1-2.cbz"));
    assert_eq!(
        read_cbz(bundle),
        vec![
            ("000.jpg".to_string(), page_url(1, 1)),
            ("001.jpg".to_string(), page_url(1, 2)),
            ("002.jpg".to_string(), page_url(2, 1)),
        ]
    );
    assert_eq!(report.archives_written(), 1);
    Ok(())
}

#[tokio::test]
async fn test_bundle_skipped_when_nothing_downloaded() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let settings = Arc::new(settings(dir.path(), 1, 1, true));
    let site = FakeSite::new(Arc::clone(&settings)).chapter(1.0, 0);
    let entries = site.entries();

    let report = FetchPipeline::new(Arc::new(site), Arc::new(ScriptedFetcher::new()), settings)
        .run("Series", entries, "1")
        .await;

    assert!(report.bundle.is_none());
    assert_eq!(report.archives_written(), 0);
    Ok(())
}

// ==================== Cancellation & progress ====================

#[tokio::test]
async fn test_cancelled_run_writes_nothing() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let settings = Arc::new(settings(dir.path(), 2, 2, false));
    let site = FakeSite::new(Arc::clone(&settings)).chapter(1.0, 3).chapter(2.0, 3);
    let entries = site.entries();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = FetchPipeline::new(Arc::new(site), Arc::new(ScriptedFetcher::new()), settings)
        .with_cancellation(cancel)
        .run("Series", entries, "1-2")
        .await;

    assert!(report.was_cancelled());
    assert_eq!(report.failures.len(), 2);
    assert!(report.archives.is_empty());
    assert_eq!(std::fs::read_dir(dir.path())?.count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_cancel_during_fetch_stops_chapter() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let settings = Arc::new(settings(dir.path(), 1, 1, false));
    let site = FakeSite::new(Arc::clone(&settings)).chapter(1.0, 50);
    let entries = site.entries();
    let fetcher = Arc::new(ScriptedFetcher::new().default_delay(Duration::from_millis(20)));

    let pipeline = FetchPipeline::new(Arc::new(site), fetcher.clone(), settings);
    let cancel = pipeline.cancellation_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(70)).await;
        cancel.cancel();
    });
    let report = pipeline.run("Series", entries, "1").await;

    assert!(report.was_cancelled());
    assert!(fetcher.calls() < 50, "calls: {}", fetcher.calls());
    assert!(report.archives.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_progress_events_and_referer() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let settings = Arc::new(settings(dir.path(), 1, 2, false));
    let site = FakeSite::new(Arc::clone(&settings)).chapter(4.0, 4);
    let entries = site.entries();
    let fetcher = Arc::new(ScriptedFetcher::new());
    let progress = Arc::new(RecordingProgress::default());

    let report = FetchPipeline::new(Arc::new(site), fetcher.clone(), settings)
        .with_progress(progress.clone())
        .run("Series", entries, "4")
        .await;
    assert!(report.is_success());

    let events = progress.events();
    assert!(matches!(events.first(), Some(ProgressEvent::ChapterStarted { chapter_number, .. }) if *chapter_number == 4.0));
    assert!(events.contains(&ProgressEvent::ChapterResolved {
        chapter_number: 4.0,
        pages: 4
    }));

    let mut completed: Vec<usize> = events
        .iter()
        .filter_map(|event| match event {
            ProgressEvent::PageCompleted { completed, percent, total, .. } => {
                assert_eq!(*total, 4);
                assert_eq!(*percent, completed * 100 / 4);
                Some(*completed)
            }
            _ => None,
        })
        .collect();
    completed.sort_unstable();
    assert_eq!(completed, vec![1, 2, 3, 4]);

    assert!(matches!(
        events.last(),
        Some(ProgressEvent::ArchiveWritten { chapter_number: Some(n), .. }) if *n == 4.0
    ));

    assert!(
        fetcher
            .referers()
            .iter()
            .all(|referer| referer.as_deref() == Some("https://comics.example"))
    );
    Ok(())
}
