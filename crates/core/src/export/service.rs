//! Export bundle assembly.
//!
//! Builds a single downloadable archive from the current expense set: a
//! CSV manifest of every record plus the receipt blobs that could be
//! fetched. Assembly is all-in-memory; the caller streams the finished
//! bytes to the client.

use std::io::{Cursor, Write};
use std::sync::Arc;

use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use super::error::ExportError;
use crate::expense::Expense;
use crate::storage::ReceiptStore;

/// Filename of the produced archive.
pub const ARCHIVE_NAME: &str = "expenses_export.zip";

/// Name of the CSV manifest inside the archive.
pub const CSV_NAME: &str = "expenses.csv";

/// Directory inside the archive holding receipt blobs.
const RECEIPTS_DIR: &str = "receipts";

/// Assembles export bundles from expense records and their receipts.
pub struct ExportService<S: ReceiptStore> {
    storage: Arc<S>,
}

impl<S: ReceiptStore> ExportService<S> {
    /// Create a new export service.
    #[must_use]
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }

    /// Build the export archive for the given records.
    ///
    /// Every record appears in the CSV, receipt or not. Receipt blobs
    /// that fail to download are skipped; their CSV rows still carry the
    /// referenced path, so a stale reference degrades the bundle instead
    /// of failing it.
    ///
    /// # Errors
    ///
    /// Returns an error only if CSV serialization or archive assembly
    /// itself fails.
    pub async fn export_all(&self, expenses: &[Expense]) -> Result<Vec<u8>, ExportError> {
        let csv = render_csv(expenses)?;

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);

        zip.start_file(CSV_NAME, options)?;
        zip.write_all(&csv)?;

        for expense in expenses {
            let Some(path) = &expense.receipt_path else {
                continue;
            };
            // Skip receipts that cannot be fetched; the row already
            // records the path.
            let Ok(bytes) = self.storage.download(path).await else {
                continue;
            };
            zip.start_file(format!("{RECEIPTS_DIR}/{path}"), options)?;
            zip.write_all(&bytes)?;
        }

        Ok(zip.finish()?.into_inner())
    }
}

/// Render the CSV manifest with a fixed header row.
fn render_csv(expenses: &[Expense]) -> Result<Vec<u8>, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer.write_record([
        "BusinessTrip",
        "Description",
        "VendorMerchant",
        "Notes",
        "Amount",
        "Currency",
        "Category",
        "ReceiptStatus",
        "Country",
        "Date",
        "ReceiptPath",
    ])?;

    for e in expenses {
        writer.write_record([
            e.business_trip.as_deref().unwrap_or_default(),
            &e.title,
            e.merchant.as_deref().unwrap_or_default(),
            e.notes.as_deref().unwrap_or_default(),
            &e.amount.to_string(),
            &e.currency,
            e.category.as_str(),
            e.receipt_status.as_str(),
            &e.country,
            &e.expense_date.to_string(),
            e.receipt_path.as_deref().unwrap_or_default(),
        ])?;
    }

    writer.into_inner().map_err(|e| ExportError::Io(e.into_error()))
}
