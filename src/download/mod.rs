//! Concurrent chapter and page downloading.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use manga_downloader::config::Settings;
//! use manga_downloader::download::{FetchPipeline, HttpClient};
//! use manga_downloader::site::{build_http_client, Grabber};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = Arc::new(Settings::default());
//! let client = build_http_client(settings.http)?;
//! let site = Grabber::with_default_sites("https://mangadex.org/title/x", settings.clone(), client.clone())?
//!     .identify()
//!     .await?
//!     .site;
//! let chapters = site.fetch_chapters().await?;
//! let pipeline = FetchPipeline::new(site, Arc::new(HttpClient::new(client)), settings);
//! let report = pipeline.run("Series", chapters, "all").await;
//! println!("archives written: {}", report.archives_written());
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod pipeline;
mod progress;

pub use client::{HttpClient, PageFetcher};
pub use error::{ChapterError, DownloadError};
pub use pipeline::{ChapterFailure, FetchPipeline, PipelineReport, PipelineStats};
pub use progress::{NoopProgress, ProgressEvent, ProgressSink, percent};
