//! Initial expenses migration.
//!
//! Creates the expenses table with its receipt reference column.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(EXPENSES_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared("DROP TABLE IF EXISTS expenses CASCADE;")
            .await?;
        Ok(())
    }
}

const EXPENSES_SQL: &str = r"
-- Expense records; receipt_path references a blob in object storage
CREATE TABLE expenses (
    id UUID PRIMARY KEY,
    business_trip TEXT,
    title TEXT NOT NULL,
    merchant TEXT,
    notes TEXT,
    amount NUMERIC(14, 2) NOT NULL,
    currency VARCHAR(8) NOT NULL,
    category TEXT NOT NULL,
    receipt_status TEXT NOT NULL DEFAULT 'Pending',
    country TEXT NOT NULL,
    expense_date DATE NOT NULL,
    reimbursable BOOLEAN NOT NULL DEFAULT false,
    receipt_path TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_amount_non_negative CHECK (amount >= 0)
);

-- Listing is always newest expense date first
CREATE INDEX idx_expenses_date ON expenses(expense_date DESC, created_at DESC);
";
