//! CSV + receipts export bundle.

mod error;
mod service;

pub use error::ExportError;
pub use service::{ARCHIVE_NAME, CSV_NAME, ExportService};
