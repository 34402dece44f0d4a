//! Export error types.

use thiserror::Error;

/// Export bundle assembly errors.
///
/// Individual receipt download failures are not errors; those receipts
/// are skipped and the bundle still ships.
#[derive(Debug, Error)]
pub enum ExportError {
    /// CSV serialization failed.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// Archive assembly failed.
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// In-memory buffer I/O failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
