//! `SeaORM` Entity for expenses table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "expenses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub business_trip: Option<String>,
    pub title: String,
    pub merchant: Option<String>,
    pub notes: Option<String>,
    pub amount: Decimal,
    pub currency: String,
    pub category: String,
    pub receipt_status: String,
    pub country: String,
    pub expense_date: Date,
    pub reimbursable: bool,
    pub receipt_path: Option<String>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
