//! Manga Downloader Library
//!
//! Downloads the chapters of a series from a supported website and packs
//! them into CBZ archives.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`ranges`] - Chapter range expressions (`1-10,12,15-20`)
//! - [`site`] - Site adapters and the grabber that picks one for a URL
//! - [`filter`] - Chapter ordering and range selection
//! - [`download`] - Two-stage concurrent chapter/page fetch pipeline
//! - [`packer`] - CBZ archives with template-driven filenames
//! - [`session`] - One run: identify, list, select, download

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod download;
pub mod filter;
pub mod models;
pub mod packer;
pub mod ranges;
pub mod session;
pub mod site;
mod user_agent;

// Re-export commonly used types
pub use config::{MaxConcurrency, Settings};
pub use download::{
    ChapterError, DownloadError, FetchPipeline, HttpClient, PageFetcher, PipelineReport,
    ProgressEvent, ProgressSink,
};
pub use models::{Chapter, ChapterEntry, ChapterLocator, DownloadedChapter, FetchedFile, Filterable, Page};
pub use packer::{PackError, Packer};
pub use ranges::{Range, parse};
pub use session::{Selection, Session, SessionError};
pub use site::{GrabError, Grabber, Site, SiteContext, SiteError, build_http_client};
