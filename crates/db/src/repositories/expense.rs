//! Expense repository for database operations.
//!
//! Implements expense CRUD operations using SeaORM.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use uuid::Uuid;

use crate::entities::expenses;
use viatica_core::expense::{
    Category, Expense, ExpenseDraft, ExpenseError,
    ExpenseRepository as ExpenseRepoTrait, ReceiptStatus,
};

/// Expense repository implementation.
#[derive(Debug, Clone)]
pub struct ExpenseRepository {
    db: DatabaseConnection,
}

impl ExpenseRepository {
    /// Create a new expense repository.
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

impl ExpenseRepoTrait for ExpenseRepository {
    async fn insert(&self, draft: ExpenseDraft) -> Result<Expense, ExpenseError> {
        let active_model = expenses::ActiveModel {
            id: Set(Uuid::new_v4()),
            business_trip: Set(draft.business_trip),
            title: Set(draft.title),
            merchant: Set(draft.merchant),
            notes: Set(draft.notes),
            amount: Set(draft.amount),
            currency: Set(draft.currency),
            category: Set(String::from(draft.category)),
            receipt_status: Set(draft.receipt_status.as_str().to_string()),
            country: Set(draft.country),
            expense_date: Set(draft.expense_date),
            reimbursable: Set(draft.reimbursable),
            // The coordinator links the receipt in a separate step.
            receipt_path: Set(None),
            created_at: Set(Utc::now().into()),
        };

        let model = active_model
            .insert(&self.db)
            .await
            .map_err(map_db_err)?;

        Ok(to_domain(model))
    }

    async fn update(&self, id: Uuid, draft: ExpenseDraft) -> Result<Expense, ExpenseError> {
        // Full replace of the non-receipt fields; receipt_path and
        // created_at are deliberately left untouched.
        let active_model = expenses::ActiveModel {
            id: Set(id),
            business_trip: Set(draft.business_trip),
            title: Set(draft.title),
            merchant: Set(draft.merchant),
            notes: Set(draft.notes),
            amount: Set(draft.amount),
            currency: Set(draft.currency),
            category: Set(String::from(draft.category)),
            receipt_status: Set(draft.receipt_status.as_str().to_string()),
            country: Set(draft.country),
            expense_date: Set(draft.expense_date),
            reimbursable: Set(draft.reimbursable),
            ..Default::default()
        };

        let model = active_model
            .update(&self.db)
            .await
            .map_err(|e| map_not_updated(e, id))?;

        Ok(to_domain(model))
    }

    async fn set_receipt_path(
        &self,
        id: Uuid,
        path: Option<String>,
    ) -> Result<(), ExpenseError> {
        let active_model = expenses::ActiveModel {
            id: Set(id),
            receipt_path: Set(path),
            ..Default::default()
        };

        active_model
            .update(&self.db)
            .await
            .map_err(|e| map_not_updated(e, id))?;

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Expense>, ExpenseError> {
        let model = expenses::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(map_db_err)?;

        Ok(model.map(to_domain))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, ExpenseError> {
        let result = expenses::Entity::delete_many()
            .filter(expenses::Column::Id.eq(id))
            .exec(&self.db)
            .await
            .map_err(map_db_err)?;

        Ok(result.rows_affected > 0)
    }

    async fn list(&self) -> Result<Vec<Expense>, ExpenseError> {
        let models = expenses::Entity::find()
            .order_by_desc(expenses::Column::ExpenseDate)
            .order_by_desc(expenses::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(map_db_err)?;

        Ok(models.into_iter().map(to_domain).collect())
    }
}

/// Map a database error to the domain error type.
fn map_db_err(e: DbErr) -> ExpenseError {
    ExpenseError::persistence(e.to_string())
}

/// Map an update error, distinguishing a missing row from a real failure.
fn map_not_updated(e: DbErr, id: Uuid) -> ExpenseError {
    match e {
        DbErr::RecordNotUpdated => ExpenseError::not_found(id),
        other => map_db_err(other),
    }
}

/// Convert database model to domain model.
fn to_domain(model: expenses::Model) -> Expense {
    Expense {
        id: model.id,
        business_trip: model.business_trip,
        title: model.title,
        merchant: model.merchant,
        notes: model.notes,
        amount: model.amount,
        currency: model.currency,
        category: Category::from(model.category),
        // Unknown status strings from older rows degrade to Pending.
        receipt_status: ReceiptStatus::parse(&model.receipt_status).unwrap_or_default(),
        country: model.country,
        expense_date: model.expense_date,
        reimbursable: model.reimbursable,
        receipt_path: model.receipt_path,
        created_at: model.created_at.with_timezone(&chrono::Utc),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn model(category: &str, receipt_status: &str) -> expenses::Model {
        expenses::Model {
            id: Uuid::new_v4(),
            business_trip: None,
            title: "Hotel night".to_string(),
            merchant: Some("Ibis".to_string()),
            notes: None,
            amount: dec!(89.90),
            currency: "EUR".to_string(),
            category: category.to_string(),
            receipt_status: receipt_status.to_string(),
            country: "France".to_string(),
            expense_date: NaiveDate::from_ymd_opt(2026, 1, 20).unwrap(),
            reimbursable: true,
            receipt_path: Some("abc.jpg".to_string()),
            created_at: Utc::now().into(),
        }
    }

    #[test]
    fn test_to_domain_maps_known_values() {
        let expense = to_domain(model("Hotel", "Approved"));

        assert_eq!(expense.category, Category::Hotel);
        assert_eq!(expense.receipt_status, ReceiptStatus::Approved);
        assert_eq!(expense.receipt_path.as_deref(), Some("abc.jpg"));
        assert_eq!(expense.amount, dec!(89.90));
    }

    #[test]
    fn test_to_domain_preserves_free_text_category() {
        let expense = to_domain(model("Conference fees", "Pending"));
        assert_eq!(
            expense.category,
            Category::Other("Conference fees".to_string())
        );
    }

    #[test]
    fn test_to_domain_defaults_unknown_status() {
        let expense = to_domain(model("Hotel", "Archived"));
        assert_eq!(expense.receipt_status, ReceiptStatus::Pending);
    }
}
