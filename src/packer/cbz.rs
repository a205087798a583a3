//! CBZ (zip of page images) writing.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::models::FetchedFile;

use super::PackError;

/// Name of the `index`-th entry: `000.jpg`, `001.jpg`, ...
#[must_use]
pub fn entry_name(index: usize) -> String {
    format!("{index:03}.jpg")
}

/// Writes `files` to a new archive at `path`, in the given order.
///
/// Returns the number of entries written. An empty list is rejected before
/// the file is created. A failure midway may leave a truncated file.
///
/// # Errors
///
/// Returns [`PackError::NoFiles`] for an empty list, [`PackError::Io`] or
/// [`PackError::Zip`] on write failures.
pub fn write_cbz(path: &Path, files: &[&FetchedFile]) -> Result<usize, PackError> {
    if files.is_empty() {
        return Err(PackError::NoFiles {
            name: path.display().to_string(),
        });
    }

    let file = File::create(path).map_err(|e| PackError::io(path, e))?;
    let mut zip = ZipWriter::new(BufWriter::new(file));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for (index, page) in files.iter().enumerate() {
        zip.start_file(entry_name(index), options)
            .map_err(|e| PackError::zip(path, e))?;
        zip.write_all(&page.data).map_err(|e| PackError::io(path, e))?;
    }

    let mut writer = zip.finish().map_err(|e| PackError::zip(path, e))?;
    writer.flush().map_err(|e| PackError::io(path, e))?;
    Ok(files.len())
}
