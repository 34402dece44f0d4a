//! Expense record types and data structures.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reimbursement status of a receipt.
///
/// The vocabulary is closed, but transitions between states are not
/// enforced; callers may move a record to any status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReceiptStatus {
    /// Awaiting review.
    #[default]
    Pending,
    /// Approved for reimbursement.
    Approved,
    /// Rejected.
    Rejected,
    /// Paid out.
    Reimbursed,
}

impl ReceiptStatus {
    /// Convert to database string value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
            Self::Reimbursed => "Reimbursed",
        }
    }

    /// Parse from database string value.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Pending" => Some(Self::Pending),
            "Approved" => Some(Self::Approved),
            "Rejected" => Some(Self::Rejected),
            "Reimbursed" => Some(Self::Reimbursed),
            _ => None,
        }
    }
}

/// Expense category.
///
/// Older records carry free-text categories, so the set stays open:
/// anything outside the recommended values round-trips through `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    /// Mileage.
    Mileage,
    /// Hotel.
    Hotel,
    /// Food & Drinks.
    FoodAndDrinks,
    /// Free-text category from older records.
    Other(String),
}

impl Category {
    /// The category's string form as persisted.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Mileage => "Mileage",
            Self::Hotel => "Hotel",
            Self::FoodAndDrinks => "Food & Drinks",
            Self::Other(s) => s.as_str(),
        }
    }
}

impl From<String> for Category {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Mileage" => Self::Mileage,
            "Hotel" => Self::Hotel,
            "Food & Drinks" => Self::FoodAndDrinks,
            _ => Self::Other(s),
        }
    }
}

impl From<Category> for String {
    fn from(c: Category) -> Self {
        c.as_str().to_string()
    }
}

/// A receipt file supplied alongside a create or update.
#[derive(Debug, Clone)]
pub struct ReceiptFile {
    /// Original filename; only the extension is kept for the storage key.
    pub filename: String,
    /// MIME type of the file.
    pub content_type: String,
    /// Raw file bytes.
    pub bytes: Vec<u8>,
}

/// Writable fields of an expense record.
///
/// Used for both insert and update; updates replace all non-receipt fields
/// (last-write-wins, matching the backing store's semantics). The receipt
/// reference is never part of a draft - the coordinator is its sole writer.
#[derive(Debug, Clone)]
pub struct ExpenseDraft {
    /// Optional business-trip label.
    pub business_trip: Option<String>,
    /// Title/description (required).
    pub title: String,
    /// Optional merchant name.
    pub merchant: Option<String>,
    /// Optional notes.
    pub notes: Option<String>,
    /// Amount, non-negative decimal.
    pub amount: Decimal,
    /// ISO 4217-like currency code.
    pub currency: String,
    /// Category.
    pub category: Category,
    /// Receipt status.
    pub receipt_status: ReceiptStatus,
    /// Country (free text).
    pub country: String,
    /// Expense date (calendar date, no time component).
    pub expense_date: NaiveDate,
    /// Whether the expense is reimbursable.
    pub reimbursable: bool,
}

/// Expense domain model.
#[derive(Debug, Clone)]
pub struct Expense {
    /// Unique identifier (store-assigned, immutable).
    pub id: Uuid,
    /// Optional business-trip label.
    pub business_trip: Option<String>,
    /// Title/description.
    pub title: String,
    /// Optional merchant name.
    pub merchant: Option<String>,
    /// Optional notes.
    pub notes: Option<String>,
    /// Amount.
    pub amount: Decimal,
    /// Currency code.
    pub currency: String,
    /// Category.
    pub category: Category,
    /// Receipt status.
    pub receipt_status: ReceiptStatus,
    /// Country.
    pub country: String,
    /// Expense date.
    pub expense_date: NaiveDate,
    /// Whether the expense is reimbursable.
    pub reimbursable: bool,
    /// Receipt storage key; when set, the blob must exist.
    pub receipt_path: Option<String>,
    /// Creation timestamp (store-assigned, immutable).
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ReceiptStatus::Pending)]
    #[case(ReceiptStatus::Approved)]
    #[case(ReceiptStatus::Rejected)]
    #[case(ReceiptStatus::Reimbursed)]
    fn test_receipt_status_roundtrip(#[case] status: ReceiptStatus) {
        assert_eq!(ReceiptStatus::parse(status.as_str()), Some(status));
    }

    #[test]
    fn test_receipt_status_unknown() {
        assert_eq!(ReceiptStatus::parse("Archived"), None);
    }

    #[test]
    fn test_receipt_status_default_is_pending() {
        assert_eq!(ReceiptStatus::default(), ReceiptStatus::Pending);
    }

    #[rstest]
    #[case("Mileage", Category::Mileage)]
    #[case("Hotel", Category::Hotel)]
    #[case("Food & Drinks", Category::FoodAndDrinks)]
    fn test_category_known_values(#[case] raw: &str, #[case] expected: Category) {
        assert_eq!(Category::from(raw.to_string()), expected);
    }

    #[test]
    fn test_category_open_set_roundtrip() {
        let c = Category::from("Taxi".to_string());
        assert_eq!(c, Category::Other("Taxi".to_string()));
        assert_eq!(c.as_str(), "Taxi");
        assert_eq!(String::from(c), "Taxi");
    }
}
