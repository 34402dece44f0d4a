//! Expense management routes.
//!
//! Create and update accept multipart bodies so a receipt file can ride
//! along with the record fields in a single request.

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::AppState;
use viatica_shared::AppError;
use viatica_core::expense::{
    Category, Expense, ExpenseDraft, ExpenseError, ExpenseService, ReceiptFile, ReceiptStatus,
};
use viatica_core::export::{ARCHIVE_NAME, ExportService};
use viatica_core::storage::{ReceiptStore, StorageService};
use viatica_db::repositories::ExpenseRepository;

/// Maximum accepted request body size (receipt uploads included).
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Creates the expense routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/expenses", get(list_expenses))
        .route("/expenses", post(create_expense))
        .route("/expenses/export", get(export_expenses))
        .route("/expenses/{id}", put(update_expense))
        .route("/expenses/{id}", delete(delete_expense))
        .route("/expenses/{id}/receipt", get(receipt_url))
        .route("/expenses/{id}/receipt", delete(remove_receipt))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Record fields carried in the `payload` multipart part.
#[derive(Debug, Deserialize)]
pub struct ExpensePayload {
    /// Optional business-trip label.
    #[serde(default)]
    pub business_trip: Option<String>,
    /// Title/description.
    pub title: String,
    /// Optional merchant name.
    #[serde(default)]
    pub merchant: Option<String>,
    /// Optional notes.
    #[serde(default)]
    pub notes: Option<String>,
    /// Amount.
    pub amount: Decimal,
    /// Currency code.
    pub currency: String,
    /// Category.
    pub category: Category,
    /// Receipt status; defaults to Pending.
    #[serde(default)]
    pub receipt_status: ReceiptStatus,
    /// Country.
    pub country: String,
    /// Expense date (YYYY-MM-DD).
    pub expense_date: NaiveDate,
    /// Whether the expense is reimbursable; defaults to false.
    #[serde(default)]
    pub reimbursable: bool,
}

impl ExpensePayload {
    fn into_draft(self) -> ExpenseDraft {
        ExpenseDraft {
            business_trip: self.business_trip,
            title: self.title,
            merchant: self.merchant,
            notes: self.notes,
            amount: self.amount,
            currency: self.currency,
            category: self.category,
            receipt_status: self.receipt_status,
            country: self.country,
            expense_date: self.expense_date,
            reimbursable: self.reimbursable,
        }
    }
}

/// Response for an expense record.
#[derive(Debug, Serialize)]
pub struct ExpenseResponse {
    /// Expense ID.
    pub id: Uuid,
    /// Business-trip label.
    pub business_trip: Option<String>,
    /// Title/description.
    pub title: String,
    /// Merchant name.
    pub merchant: Option<String>,
    /// Notes.
    pub notes: Option<String>,
    /// Amount.
    pub amount: Decimal,
    /// Currency code.
    pub currency: String,
    /// Category.
    pub category: String,
    /// Receipt status.
    pub receipt_status: String,
    /// Country.
    pub country: String,
    /// Expense date.
    pub expense_date: NaiveDate,
    /// Whether the expense is reimbursable.
    pub reimbursable: bool,
    /// Receipt storage key, when a receipt is linked.
    pub receipt_path: Option<String>,
    /// Public receipt URL, when a receipt is linked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt_url: Option<String>,
    /// Created at timestamp (ISO 8601).
    pub created_at: String,
}

impl ExpenseResponse {
    fn from_expense(expense: Expense, storage: &StorageService) -> Self {
        let receipt_url = expense
            .receipt_path
            .as_deref()
            .map(|path| storage.public_url(path));

        Self {
            id: expense.id,
            business_trip: expense.business_trip,
            title: expense.title,
            merchant: expense.merchant,
            notes: expense.notes,
            amount: expense.amount,
            currency: expense.currency,
            category: String::from(expense.category),
            receipt_status: expense.receipt_status.as_str().to_string(),
            country: expense.country,
            expense_date: expense.expense_date,
            reimbursable: expense.reimbursable,
            receipt_path: expense.receipt_path,
            receipt_url,
            created_at: expense.created_at.to_rfc3339(),
        }
    }
}

/// Response for a create or update, carrying the receipt outcome.
#[derive(Debug, Serialize)]
pub struct SaveResponse {
    /// The persisted record.
    pub expense: ExpenseResponse,
    /// Present when the record saved but the receipt did not fully attach.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt_warning: Option<String>,
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Build the expense service from shared state.
fn expense_service(state: &AppState) -> ExpenseService<ExpenseRepository, StorageService> {
    let repo = ExpenseRepository::new((*state.db).clone());
    ExpenseService::new(std::sync::Arc::new(repo), state.storage.clone())
}

/// Pull the record payload and optional receipt file out of a multipart body.
async fn parse_multipart(
    mut multipart: Multipart,
) -> Result<(ExpensePayload, Option<ReceiptFile>), Response> {
    let mut payload: Option<ExpensePayload> = None;
    let mut file: Option<ReceiptFile> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("Malformed multipart body: {e}")))?
    {
        match field.name() {
            Some("payload") => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| bad_request(format!("Failed to read payload: {e}")))?;
                let parsed = serde_json::from_slice(&bytes)
                    .map_err(|e| bad_request(format!("Invalid expense payload: {e}")))?;
                payload = Some(parsed);
            }
            Some("receipt") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("image/jpeg")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| bad_request(format!("Failed to read receipt: {e}")))?;
                file = Some(ReceiptFile {
                    filename,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            _ => {}
        }
    }

    let payload = payload
        .ok_or_else(|| bad_request("Multipart part 'payload' is required".to_string()))?;

    Ok((payload, file))
}

/// Shorthand for a 400 response with the standard error body.
fn bad_request(message: String) -> Response {
    app_error_response(&AppError::Validation(message))
}

/// Map a domain error to an HTTP response.
fn expense_error_response(e: &ExpenseError) -> Response {
    let app = match e {
        ExpenseError::NotFound(_) => AppError::NotFound("Expense not found".to_string()),
        ExpenseError::ReceiptMissing(_) => {
            AppError::NotFound("Expense has no receipt".to_string())
        }
        ExpenseError::Validation(msg) => AppError::Validation(msg.clone()),
        ExpenseError::Storage(err) => AppError::Storage(err.to_string()),
        ExpenseError::Persistence(msg) => AppError::Persistence(msg.clone()),
    };
    app_error_response(&app)
}

/// Render the standard error body for an application error.
fn app_error_response(e: &AppError) -> Response {
    let status =
        StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        Json(json!({
            "error": e.error_code(),
            "message": e.to_string()
        })),
    )
        .into_response()
}

// ============================================================================
// Route Handlers
// ============================================================================

/// GET `/expenses`
/// List all expenses, newest expense date first.
async fn list_expenses(State(state): State<AppState>) -> impl IntoResponse {
    let service = expense_service(&state);

    match service.list().await {
        Ok(expenses) => {
            let items: Vec<ExpenseResponse> = expenses
                .into_iter()
                .map(|e| ExpenseResponse::from_expense(e, &state.storage))
                .collect();

            (StatusCode::OK, Json(json!({ "expenses": items }))).into_response()
        }
        Err(e) => {
            error!(error = %e, "Failed to list expenses");
            expense_error_response(&e)
        }
    }
}

/// POST `/expenses`
/// Create an expense, optionally attaching a receipt file.
async fn create_expense(
    State(state): State<AppState>,
    multipart: Multipart,
) -> impl IntoResponse {
    let (payload, file) = match parse_multipart(multipart).await {
        Ok(parsed) => parsed,
        Err(response) => return response,
    };

    let service = expense_service(&state);

    match service.create(payload.into_draft(), file).await {
        Ok(outcome) => {
            let receipt_warning = outcome.receipt.warning();
            if let Some(warning) = &receipt_warning {
                warn!(expense_id = %outcome.expense.id, warning = %warning, "Expense created with partial receipt");
            } else {
                info!(expense_id = %outcome.expense.id, "Expense created");
            }

            let response = SaveResponse {
                expense: ExpenseResponse::from_expense(outcome.expense, &state.storage),
                receipt_warning,
            };

            (StatusCode::CREATED, Json(response)).into_response()
        }
        Err(e) => {
            error!(error = %e, "Failed to create expense");
            expense_error_response(&e)
        }
    }
}

/// PUT `/expenses/{id}`
/// Replace an expense's fields, optionally replacing its receipt.
async fn update_expense(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> impl IntoResponse {
    let (payload, file) = match parse_multipart(multipart).await {
        Ok(parsed) => parsed,
        Err(response) => return response,
    };

    let service = expense_service(&state);

    match service.update(id, payload.into_draft(), file).await {
        Ok(outcome) => {
            let receipt_warning = outcome.receipt.warning();
            if let Some(warning) = &receipt_warning {
                warn!(expense_id = %id, warning = %warning, "Expense updated with partial receipt");
            } else {
                info!(expense_id = %id, "Expense updated");
            }

            let response = SaveResponse {
                expense: ExpenseResponse::from_expense(outcome.expense, &state.storage),
                receipt_warning,
            };

            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => {
            error!(error = %e, expense_id = %id, "Failed to update expense");
            expense_error_response(&e)
        }
    }
}

/// DELETE `/expenses/{id}`
/// Delete an expense and reclaim its receipt blob.
async fn delete_expense(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let service = expense_service(&state);

    match service.delete(id).await {
        Ok(()) => {
            info!(expense_id = %id, "Expense deleted");
            (StatusCode::NO_CONTENT, ()).into_response()
        }
        Err(e) => {
            error!(error = %e, expense_id = %id, "Failed to delete expense");
            expense_error_response(&e)
        }
    }
}

/// DELETE `/expenses/{id}/receipt`
/// Remove an expense's receipt, blob first.
async fn remove_receipt(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let service = expense_service(&state);

    match service.remove_receipt(id).await {
        Ok(expense) => {
            info!(expense_id = %id, "Receipt removed");
            (
                StatusCode::OK,
                Json(ExpenseResponse::from_expense(expense, &state.storage)),
            )
                .into_response()
        }
        Err(e) => {
            error!(error = %e, expense_id = %id, "Failed to remove receipt");
            expense_error_response(&e)
        }
    }
}

/// GET `/expenses/{id}/receipt`
/// Resolve the public URL of an expense's receipt.
async fn receipt_url(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let service = expense_service(&state);

    match service.receipt_url(id).await {
        Ok(url) => (StatusCode::OK, Json(json!({ "url": url }))).into_response(),
        Err(e) => {
            error!(error = %e, expense_id = %id, "Failed to resolve receipt URL");
            expense_error_response(&e)
        }
    }
}

/// GET `/expenses/export`
/// Download the CSV + receipts bundle for all expenses.
async fn export_expenses(State(state): State<AppState>) -> impl IntoResponse {
    let repo_service = expense_service(&state);

    let expenses = match repo_service.list().await {
        Ok(expenses) => expenses,
        Err(e) => {
            error!(error = %e, "Failed to load expenses for export");
            return expense_error_response(&e);
        }
    };

    let export = ExportService::new(state.storage.clone());

    match export.export_all(&expenses).await {
        Ok(bytes) => {
            info!(records = expenses.len(), "Export bundle assembled");
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, "application/zip".to_string()),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename=\"{ARCHIVE_NAME}\""),
                    ),
                ],
                bytes,
            )
                .into_response()
        }
        Err(e) => {
            error!(error = %e, "Failed to assemble export bundle");
            app_error_response(&AppError::Export(e.to_string()))
        }
    }
}
