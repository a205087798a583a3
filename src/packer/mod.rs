//! CBZ packaging of downloaded chapters.
//!
//! A chapter (or a bundle of chapters) becomes one zip archive whose entries
//! are the page images in order, named `000.jpg`, `001.jpg`, ... The archive
//! name comes from the filename template plus `.cbz`.

mod cbz;
mod error;
mod filename;

pub use cbz::{entry_name, write_cbz};
pub use error::{PackError, TemplateError};
pub use filename::{FilenameParts, format_chapter_number, render, sanitize_filename};

use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use crate::config::Settings;
use crate::models::{DownloadedChapter, FetchedFile, Filterable};

/// Title used for bundle archives.
pub const BUNDLE_TITLE: &str = "bundle";

/// Writes archives into an output directory using a filename template.
#[derive(Debug, Clone)]
pub struct Packer {
    output_dir: PathBuf,
    template: String,
}

impl Packer {
    /// Creates a packer writing into `output_dir`.
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>, template: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            template: template.into(),
        }
    }

    /// Creates a packer from the run settings.
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(&settings.output_dir, &settings.filename_template)
    }

    /// Directory receiving the archives.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Renders the archive name of one chapter, without extension.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError`] for an invalid template.
    pub fn chapter_name(&self, series: &str, chapter: &DownloadedChapter) -> Result<String, TemplateError> {
        let parts = FilenameParts::new(
            series,
            &format_chapter_number(chapter.number()),
            &chapter.title(),
        );
        render(&self.template, &parts)
    }

    /// Packs one chapter into `{template}.cbz`.
    ///
    /// # Errors
    ///
    /// See [`PackError`].
    #[instrument(skip(self, chapter), fields(chapter = chapter.number()))]
    pub fn pack_single(&self, series: &str, chapter: &DownloadedChapter) -> Result<PathBuf, PackError> {
        let name = self.chapter_name(series, chapter)?;
        self.pack_named(&name, chapter)
    }

    /// Packs one chapter under an already rendered `name`.
    ///
    /// # Errors
    ///
    /// See [`PackError`].
    pub fn pack_named(&self, name: &str, chapter: &DownloadedChapter) -> Result<PathBuf, PackError> {
        let files: Vec<&FetchedFile> = chapter.files.iter().collect();
        self.write(name, &files)
    }

    /// Packs several chapters into one archive, in ascending chapter order,
    /// using `range_label` as the number and `bundle` as the title.
    ///
    /// # Errors
    ///
    /// See [`PackError`].
    #[instrument(skip(self, chapters), fields(chapters = chapters.len()))]
    pub fn pack_bundle(
        &self,
        series: &str,
        chapters: &[DownloadedChapter],
        range_label: &str,
    ) -> Result<PathBuf, PackError> {
        let mut ordered: Vec<&DownloadedChapter> = chapters.iter().collect();
        ordered.sort_by(|a, b| a.number().total_cmp(&b.number()));

        let files: Vec<&FetchedFile> = ordered.iter().flat_map(|c| c.files.iter()).collect();
        let name = render(&self.template, &FilenameParts::new(series, range_label, BUNDLE_TITLE))?;
        self.write(&name, &files)
    }

    fn write(&self, name: &str, files: &[&FetchedFile]) -> Result<PathBuf, PackError> {
        if files.is_empty() {
            return Err(PackError::NoFiles {
                name: name.to_string(),
            });
        }

        std::fs::create_dir_all(&self.output_dir).map_err(|e| PackError::io(&self.output_dir, e))?;
        let path = self.output_dir.join(format!("{name}.cbz"));
        debug!(path = %path.display(), entries = files.len(), "writing archive");

        write_cbz(&path, files)?;
        info!(path = %path.display(), pages = files.len(), "archive written");
        Ok(path)
    }
}

/// Returns `name` with a ` v{n}` suffix for the `n`-th archive sharing it;
/// the first one keeps the plain name.
#[must_use]
pub fn versioned_name(name: &str, version: u32) -> String {
    if version > 1 {
        format!("{name} v{version}")
    } else {
        name.to_string()
    }
}
