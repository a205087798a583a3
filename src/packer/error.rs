//! Error types for archive naming and writing.

use std::path::PathBuf;

use thiserror::Error;

/// Errors while rendering a filename template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// A `{name}` placeholder that is not `Series`, `Number` or `Title`.
    #[error("unknown placeholder '{{{name}}}' in filename template '{template}'\n  Suggestion: Use {{Series}}, {{Number}} and {{Title}}")]
    UnknownPlaceholder {
        /// The placeholder name.
        name: String,
        /// The whole template.
        template: String,
    },

    /// A `{` without matching `}`.
    #[error("unclosed placeholder in filename template '{template}'")]
    Unclosed {
        /// The whole template.
        template: String,
    },

    /// The template rendered to an empty name.
    #[error("filename template '{template}' rendered an empty filename")]
    Empty {
        /// The whole template.
        template: String,
    },
}

/// Errors while producing an archive.
#[derive(Debug, Error)]
pub enum PackError {
    /// The archive name could not be built.
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// Nothing to archive; no file is created.
    #[error("no files to pack for {name}")]
    NoFiles {
        /// Archive name without extension.
        name: String,
    },

    /// File system error. The archive may be truncated.
    #[error("IO error writing {path}: {source}")]
    Io {
        /// Path being written.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Zip encoding error. The archive may be truncated.
    #[error("zip error writing {path}: {source}")]
    Zip {
        /// Path being written.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: zip::result::ZipError,
    },
}

impl PackError {
    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a zip error.
    pub fn zip(path: impl Into<PathBuf>, source: zip::result::ZipError) -> Self {
        Self::Zip {
            path: path.into(),
            source,
        }
    }
}
