//! Expense records and the receipt lifecycle coordinator.

mod error;
mod service;
mod types;

pub use error::ExpenseError;
pub use service::{
    ExpenseRepository, ExpenseService, ReceiptOutcome, SaveOutcome, receipt_key,
};
pub use types::{Category, Expense, ExpenseDraft, ReceiptFile, ReceiptStatus};
