//! Expense error types.

use thiserror::Error;
use uuid::Uuid;

use crate::storage::StorageError;

/// Expense operation errors.
#[derive(Debug, Error)]
pub enum ExpenseError {
    /// Expense not found.
    #[error("expense not found: {0}")]
    NotFound(Uuid),

    /// Operation requires a receipt but the record has none.
    #[error("expense {0} has no receipt")]
    ReceiptMissing(Uuid),

    /// Input failed validation.
    #[error("invalid expense: {0}")]
    Validation(String),

    /// Record store rejected a read or write.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Blob storage operation failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl ExpenseError {
    /// Create a not found error.
    #[must_use]
    pub fn not_found(id: Uuid) -> Self {
        Self::NotFound(id)
    }

    /// Create a validation error.
    #[must_use]
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a persistence error.
    #[must_use]
    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }
}
