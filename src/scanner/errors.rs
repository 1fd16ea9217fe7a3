use std::path::PathBuf;

use thiserror::Error;

use crate::catalog::CatalogError;

/// Errors that can abort a catalog pass.
#[derive(Debug, Error)]
pub enum ScanError {
    /// No base path has been stored in the catalog yet.
    #[error("No base path configured; set one before scanning")]
    MissingBasePath,
    /// The base path is not a readable directory.
    #[error("Base path is not a directory: {0}")]
    InvalidRoot(PathBuf),
    /// Pass was canceled by the caller.
    #[error("Scan canceled")]
    Canceled,
    /// Failed to read a file or directory.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// Path that failed to read.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },
    /// A file became unreadable after it was opened for hashing.
    #[error("Failed while hashing {path}: {source}")]
    Hash {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The catalog records a hash algorithm this build does not know.
    #[error("Catalog was built with unknown hash algorithm {0:?}")]
    UnknownHashAlgorithm(String),
    /// The hand-off between walker and writer closed unexpectedly.
    #[error("Catalog writer hand-off closed unexpectedly")]
    WriterDisconnected,
    /// The writer thread panicked.
    #[error("Catalog writer thread panicked")]
    WriterPanicked,
    /// Catalog operation failed during the pass.
    #[error("Catalog error: {0}")]
    Db(#[from] CatalogError),
}
