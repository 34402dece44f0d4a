//! Expense service implementation.
//!
//! Sequences record-store and blob-store operations so the receipt
//! reference stays consistent with what actually exists in storage. The
//! two stores share no transaction, so each protocol orders its steps
//! (upload before link, remove before unlink) and reports named partial
//! states instead of a bare success/failure flag.

use std::sync::Arc;

use uuid::Uuid;

use super::error::ExpenseError;
use super::types::{Expense, ExpenseDraft, ReceiptFile};
use crate::storage::{ReceiptStore, StorageError};

/// Fallback extension when the filename has none usable.
const DEFAULT_EXTENSION: &str = "jpg";

/// Repository trait for expense persistence.
///
/// This trait is implemented by the db crate to provide actual database
/// operations. None of these touch blob storage.
pub trait ExpenseRepository: Send + Sync {
    /// Insert a new expense record with a null receipt reference and
    /// return it fully materialized (id and timestamp assigned).
    fn insert(
        &self,
        draft: ExpenseDraft,
    ) -> impl std::future::Future<Output = Result<Expense, ExpenseError>> + Send;

    /// Replace all non-receipt fields of an expense and return the
    /// updated record. Never touches the receipt reference.
    fn update(
        &self,
        id: Uuid,
        draft: ExpenseDraft,
    ) -> impl std::future::Future<Output = Result<Expense, ExpenseError>> + Send;

    /// Set or clear the receipt reference. The coordinator is the sole
    /// caller of this operation.
    fn set_receipt_path(
        &self,
        id: Uuid,
        path: Option<String>,
    ) -> impl std::future::Future<Output = Result<(), ExpenseError>> + Send;

    /// Find an expense by id.
    fn find_by_id(
        &self,
        id: Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Expense>, ExpenseError>> + Send;

    /// Delete an expense by id, returning whether a row was removed.
    fn delete(
        &self,
        id: Uuid,
    ) -> impl std::future::Future<Output = Result<bool, ExpenseError>> + Send;

    /// List all expenses ordered by expense date descending.
    fn list(&self)
    -> impl std::future::Future<Output = Result<Vec<Expense>, ExpenseError>> + Send;
}

/// Outcome of the receipt half of a create or update.
///
/// The record-level change committed in every variant except the error
/// path of the operation itself; these variants describe what happened
/// to the receipt afterwards, so "saved but receipt not linked" is never
/// reported identically to a plain success.
#[derive(Debug)]
pub enum ReceiptOutcome {
    /// No receipt change was requested.
    NotRequested,
    /// Receipt uploaded and linked.
    Linked {
        /// Storage key now referenced by the record.
        path: String,
    },
    /// Upload failed; the record exists without a receipt.
    UploadFailed {
        /// Why the upload failed.
        error: StorageError,
    },
    /// Upload succeeded but linking failed; the blob is orphaned until
    /// the caller retries. No automatic retry or cleanup is attempted.
    LinkFailed {
        /// Storage key of the orphaned blob.
        path: String,
        /// Why the link failed.
        error: ExpenseError,
    },
}

impl ReceiptOutcome {
    /// Human-readable warning for partial outcomes, `None` otherwise.
    #[must_use]
    pub fn warning(&self) -> Option<String> {
        match self {
            Self::NotRequested | Self::Linked { .. } => None,
            Self::UploadFailed { error } => Some(format!("receipt upload failed: {error}")),
            Self::LinkFailed { error, .. } => Some(format!("receipt not linked: {error}")),
        }
    }
}

/// Result of a create or update.
#[derive(Debug)]
pub struct SaveOutcome {
    /// The persisted record. Reflects the linked receipt path when the
    /// receipt half completed.
    pub expense: Expense,
    /// What happened to the supplied receipt, if any.
    pub receipt: ReceiptOutcome,
}

/// Coordinates the expense record lifecycle across the record store and
/// receipt blob storage.
pub struct ExpenseService<R: ExpenseRepository, S: ReceiptStore> {
    repo: Arc<R>,
    storage: Arc<S>,
}

impl<R: ExpenseRepository, S: ReceiptStore> ExpenseService<R, S> {
    /// Create a new expense service.
    #[must_use]
    pub fn new(repo: Arc<R>, storage: Arc<S>) -> Self {
        Self { repo, storage }
    }

    /// Create an expense, optionally attaching a receipt.
    ///
    /// The record is inserted first with a null receipt reference; only
    /// then is the blob uploaded and linked, so the reference never
    /// points at a blob that does not exist. A failed upload or link
    /// leaves the record in place and surfaces as a [`ReceiptOutcome`]
    /// variant rather than an error.
    ///
    /// # Errors
    ///
    /// Returns an error if validation or the insert itself fails; no
    /// blob operation is attempted in that case.
    pub async fn create(
        &self,
        draft: ExpenseDraft,
        file: Option<ReceiptFile>,
    ) -> Result<SaveOutcome, ExpenseError> {
        validate(&draft)?;

        let expense = self.repo.insert(draft).await?;

        let receipt = match file {
            None => ReceiptOutcome::NotRequested,
            Some(file) => self.attach_receipt(expense.id, file).await,
        };

        Ok(SaveOutcome {
            expense: with_receipt(expense, &receipt),
            receipt,
        })
    }

    /// Update an expense's non-receipt fields, optionally replacing its
    /// receipt.
    ///
    /// Field changes commit first. A replacement receipt uploads to the
    /// key derived from the id and the new file's extension; when the
    /// extension is unchanged this overwrites in place, otherwise the
    /// old-extension blob is left behind; there is no cleanup pass.
    ///
    /// # Errors
    ///
    /// Returns an error if validation or the field update fails; no blob
    /// is touched in that case.
    pub async fn update(
        &self,
        id: Uuid,
        draft: ExpenseDraft,
        file: Option<ReceiptFile>,
    ) -> Result<SaveOutcome, ExpenseError> {
        validate(&draft)?;

        let expense = self.repo.update(id, draft).await?;

        let receipt = match file {
            None => ReceiptOutcome::NotRequested,
            Some(file) => self.attach_receipt(id, file).await,
        };

        Ok(SaveOutcome {
            expense: with_receipt(expense, &receipt),
            receipt,
        })
    }

    /// Remove an expense's receipt.
    ///
    /// Fail-closed: the blob is removed first, and the reference is only
    /// cleared once removal succeeded. A removal failure leaves the
    /// reference untouched, so it never points at a deleted blob.
    ///
    /// # Errors
    ///
    /// Returns an error if the record does not exist, has no receipt,
    /// blob removal fails, or clearing the reference fails. In the last
    /// case the blob is already gone and the record merely under-reports
    /// it - a consistent state; retrying is safe.
    pub async fn remove_receipt(&self, id: Uuid) -> Result<Expense, ExpenseError> {
        let expense = self
            .repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| ExpenseError::not_found(id))?;

        let Some(path) = expense.receipt_path.clone() else {
            return Err(ExpenseError::ReceiptMissing(id));
        };

        self.storage.remove(&path).await?;

        self.repo.set_receipt_path(id, None).await?;

        Ok(Expense {
            receipt_path: None,
            ..expense
        })
    }

    /// Delete an expense, reclaiming its receipt blob.
    ///
    /// Blob removal is best-effort: an orphaned blob is preferred over an
    /// undeletable record, so a removal failure does not block the
    /// delete and is not rolled back.
    ///
    /// # Errors
    ///
    /// Returns an error if the record does not exist or the record-store
    /// delete fails.
    pub async fn delete(&self, id: Uuid) -> Result<(), ExpenseError> {
        let expense = self
            .repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| ExpenseError::not_found(id))?;

        if let Some(path) = &expense.receipt_path {
            let _ = self.storage.remove(path).await;
        }

        let deleted = self.repo.delete(id).await?;
        if !deleted {
            return Err(ExpenseError::not_found(id));
        }

        Ok(())
    }

    /// Get an expense by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the record does not exist or the lookup fails.
    pub async fn get_by_id(&self, id: Uuid) -> Result<Expense, ExpenseError> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| ExpenseError::not_found(id))
    }

    /// List all expenses, newest expense date first.
    ///
    /// The service is stateless between calls; callers refresh their view
    /// by re-invoking this after a successful mutation.
    ///
    /// # Errors
    ///
    /// Returns an error if the record store read fails.
    pub async fn list(&self) -> Result<Vec<Expense>, ExpenseError> {
        self.repo.list().await
    }

    /// Resolve the public retrieval URL for an expense's receipt.
    ///
    /// # Errors
    ///
    /// Returns an error if the record does not exist or has no receipt.
    pub async fn receipt_url(&self, id: Uuid) -> Result<String, ExpenseError> {
        let expense = self
            .repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| ExpenseError::not_found(id))?;

        let Some(path) = &expense.receipt_path else {
            return Err(ExpenseError::ReceiptMissing(id));
        };

        Ok(self.storage.public_url(path))
    }

    /// Upload a receipt and link it to the record: upload-before-link.
    async fn attach_receipt(&self, id: Uuid, file: ReceiptFile) -> ReceiptOutcome {
        let path = receipt_key(id, &file.filename);

        if let Err(error) = self
            .storage
            .upload(&path, file.bytes, &file.content_type)
            .await
        {
            return ReceiptOutcome::UploadFailed { error };
        }

        match self.repo.set_receipt_path(id, Some(path.clone())).await {
            Ok(()) => ReceiptOutcome::Linked { path },
            Err(error) => ReceiptOutcome::LinkFailed { path, error },
        }
    }
}

/// Derive the storage key for an expense's receipt: `{id}.{ext}`.
///
/// The extension is taken from the filename, lowercased and stripped to
/// ASCII alphanumerics, defaulting to `jpg` when nothing usable remains.
/// The key is a pure function of the id and extension, so replacing a
/// receipt with the same extension overwrites in place.
#[must_use]
pub fn receipt_key(id: Uuid, filename: &str) -> String {
    format!("{id}.{}", normalize_extension(filename))
}

/// Extract and normalize a filename extension.
fn normalize_extension(filename: &str) -> String {
    let ext: String = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .unwrap_or_default()
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect();

    if ext.is_empty() {
        DEFAULT_EXTENSION.to_string()
    } else {
        ext
    }
}

/// Validate a draft before it reaches the record store.
fn validate(draft: &ExpenseDraft) -> Result<(), ExpenseError> {
    if draft.title.trim().is_empty() {
        return Err(ExpenseError::validation("title must not be empty"));
    }
    if draft.amount.is_sign_negative() {
        return Err(ExpenseError::validation("amount must not be negative"));
    }
    if draft.currency.trim().is_empty() {
        return Err(ExpenseError::validation("currency must not be empty"));
    }
    Ok(())
}

/// Reflect a linked receipt path on the returned record.
fn with_receipt(expense: Expense, receipt: &ReceiptOutcome) -> Expense {
    match receipt {
        ReceiptOutcome::Linked { path } => Expense {
            receipt_path: Some(path.clone()),
            ..expense
        },
        _ => expense,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expense::{Category, ReceiptStatus};
    use chrono::{NaiveDate, Utc};
    use rust_decimal_macros::dec;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Mock repository for testing.
    #[derive(Default)]
    struct MockExpenseRepository {
        expenses: Mutex<HashMap<Uuid, Expense>>,
        fail_insert: bool,
        fail_update: bool,
        fail_set_path: bool,
        fail_delete: bool,
    }

    impl MockExpenseRepository {
        fn with_expense(expense: Expense) -> Self {
            let repo = Self::default();
            repo.expenses
                .lock()
                .unwrap()
                .insert(expense.id, expense);
            repo
        }

        fn get(&self, id: Uuid) -> Option<Expense> {
            self.expenses.lock().unwrap().get(&id).cloned()
        }
    }

    impl ExpenseRepository for MockExpenseRepository {
        async fn insert(&self, draft: ExpenseDraft) -> Result<Expense, ExpenseError> {
            if self.fail_insert {
                return Err(ExpenseError::persistence("insert rejected"));
            }
            let expense = materialize(Uuid::new_v4(), draft);
            self.expenses
                .lock()
                .unwrap()
                .insert(expense.id, expense.clone());
            Ok(expense)
        }

        async fn update(&self, id: Uuid, draft: ExpenseDraft) -> Result<Expense, ExpenseError> {
            if self.fail_update {
                return Err(ExpenseError::persistence("update rejected"));
            }
            let mut expenses = self.expenses.lock().unwrap();
            let existing = expenses
                .get(&id)
                .cloned()
                .ok_or_else(|| ExpenseError::not_found(id))?;
            let updated = Expense {
                receipt_path: existing.receipt_path.clone(),
                created_at: existing.created_at,
                ..materialize(id, draft)
            };
            expenses.insert(id, updated.clone());
            Ok(updated)
        }

        async fn set_receipt_path(
            &self,
            id: Uuid,
            path: Option<String>,
        ) -> Result<(), ExpenseError> {
            if self.fail_set_path {
                return Err(ExpenseError::persistence("receipt link rejected"));
            }
            let mut expenses = self.expenses.lock().unwrap();
            let expense = expenses
                .get_mut(&id)
                .ok_or_else(|| ExpenseError::not_found(id))?;
            expense.receipt_path = path;
            Ok(())
        }

        async fn find_by_id(&self, id: Uuid) -> Result<Option<Expense>, ExpenseError> {
            Ok(self.expenses.lock().unwrap().get(&id).cloned())
        }

        async fn delete(&self, id: Uuid) -> Result<bool, ExpenseError> {
            if self.fail_delete {
                return Err(ExpenseError::persistence("delete rejected"));
            }
            Ok(self.expenses.lock().unwrap().remove(&id).is_some())
        }

        async fn list(&self) -> Result<Vec<Expense>, ExpenseError> {
            let mut all: Vec<Expense> =
                self.expenses.lock().unwrap().values().cloned().collect();
            all.sort_by(|a, b| b.expense_date.cmp(&a.expense_date));
            Ok(all)
        }
    }

    /// Mock blob store for testing.
    #[derive(Default)]
    struct MockReceiptStore {
        blobs: Mutex<HashMap<String, Vec<u8>>>,
        fail_upload: bool,
        fail_remove: bool,
    }

    impl MockReceiptStore {
        fn contains(&self, key: &str) -> bool {
            self.blobs.lock().unwrap().contains_key(key)
        }

        fn len(&self) -> usize {
            self.blobs.lock().unwrap().len()
        }
    }

    impl ReceiptStore for MockReceiptStore {
        async fn upload(
            &self,
            key: &str,
            bytes: Vec<u8>,
            _content_type: &str,
        ) -> Result<(), StorageError> {
            if self.fail_upload {
                return Err(StorageError::operation("upload failed"));
            }
            self.blobs.lock().unwrap().insert(key.to_string(), bytes);
            Ok(())
        }

        async fn download(&self, key: &str) -> Result<Vec<u8>, StorageError> {
            self.blobs
                .lock()
                .unwrap()
                .get(key)
                .cloned()
                .ok_or_else(|| StorageError::not_found(key))
        }

        async fn remove(&self, key: &str) -> Result<(), StorageError> {
            if self.fail_remove {
                return Err(StorageError::operation("remove failed"));
            }
            self.blobs.lock().unwrap().remove(key);
            Ok(())
        }

        fn public_url(&self, key: &str) -> String {
            format!("mock://receipts/{key}")
        }
    }

    fn draft() -> ExpenseDraft {
        ExpenseDraft {
            business_trip: Some("Berlin Q3".to_string()),
            title: "Client dinner".to_string(),
            merchant: Some("Gasthaus".to_string()),
            notes: None,
            amount: dec!(42.50),
            currency: "EUR".to_string(),
            category: Category::FoodAndDrinks,
            receipt_status: ReceiptStatus::Pending,
            country: "Germany".to_string(),
            expense_date: NaiveDate::from_ymd_opt(2026, 3, 14).unwrap(),
            reimbursable: false,
        }
    }

    fn materialize(id: Uuid, draft: ExpenseDraft) -> Expense {
        Expense {
            id,
            business_trip: draft.business_trip,
            title: draft.title,
            merchant: draft.merchant,
            notes: draft.notes,
            amount: draft.amount,
            currency: draft.currency,
            category: draft.category,
            receipt_status: draft.receipt_status,
            country: draft.country,
            expense_date: draft.expense_date,
            reimbursable: draft.reimbursable,
            receipt_path: None,
            created_at: Utc::now(),
        }
    }

    fn existing_expense(receipt_path: Option<&str>) -> Expense {
        Expense {
            receipt_path: receipt_path.map(String::from),
            ..materialize(Uuid::new_v4(), draft())
        }
    }

    fn png_file() -> ReceiptFile {
        ReceiptFile {
            filename: "Receipt.PNG".to_string(),
            content_type: "image/png".to_string(),
            bytes: b"png bytes".to_vec(),
        }
    }

    fn service(
        repo: MockExpenseRepository,
        store: MockReceiptStore,
    ) -> (
        ExpenseService<MockExpenseRepository, MockReceiptStore>,
        Arc<MockExpenseRepository>,
        Arc<MockReceiptStore>,
    ) {
        let repo = Arc::new(repo);
        let store = Arc::new(store);
        (
            ExpenseService::new(repo.clone(), store.clone()),
            repo,
            store,
        )
    }

    #[tokio::test]
    async fn test_create_without_file() {
        let (service, repo, store) =
            service(MockExpenseRepository::default(), MockReceiptStore::default());

        let outcome = service.create(draft(), None).await.unwrap();

        assert!(matches!(outcome.receipt, ReceiptOutcome::NotRequested));
        assert!(outcome.expense.receipt_path.is_none());
        assert!(repo.get(outcome.expense.id).is_some());
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn test_create_with_file_links_receipt() {
        let (service, repo, store) =
            service(MockExpenseRepository::default(), MockReceiptStore::default());

        let outcome = service.create(draft(), Some(png_file())).await.unwrap();

        let id = outcome.expense.id;
        let expected_path = format!("{id}.png");
        assert!(
            matches!(&outcome.receipt, ReceiptOutcome::Linked { path } if *path == expected_path)
        );
        assert_eq!(outcome.expense.receipt_path.as_deref(), Some(expected_path.as_str()));
        assert_eq!(
            repo.get(id).unwrap().receipt_path.as_deref(),
            Some(expected_path.as_str())
        );

        // Non-null reference implies the blob exists: round-trip it.
        let bytes = store.download(&expected_path).await.unwrap();
        assert_eq!(bytes, b"png bytes");
    }

    #[tokio::test]
    async fn test_create_insert_failure_touches_no_blob() {
        let repo = MockExpenseRepository {
            fail_insert: true,
            ..Default::default()
        };
        let (service, _, store) = service(repo, MockReceiptStore::default());

        let err = service.create(draft(), Some(png_file())).await.unwrap_err();

        assert!(matches!(err, ExpenseError::Persistence(_)));
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn test_create_upload_failure_keeps_record() {
        let store = MockReceiptStore {
            fail_upload: true,
            ..Default::default()
        };
        let (service, repo, store) = service(MockExpenseRepository::default(), store);

        let outcome = service.create(draft(), Some(png_file())).await.unwrap();

        assert!(matches!(outcome.receipt, ReceiptOutcome::UploadFailed { .. }));
        assert!(outcome.receipt.warning().is_some());
        // The record survives without a receipt; nothing landed in storage.
        assert!(repo.get(outcome.expense.id).unwrap().receipt_path.is_none());
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn test_create_link_failure_leaves_orphan_blob() {
        let repo = MockExpenseRepository {
            fail_set_path: true,
            ..Default::default()
        };
        let (service, repo, store) = service(repo, MockReceiptStore::default());

        let outcome = service.create(draft(), Some(png_file())).await.unwrap();

        let id = outcome.expense.id;
        assert!(matches!(outcome.receipt, ReceiptOutcome::LinkFailed { .. }));
        // Blob uploaded but unreferenced; no automatic cleanup.
        assert!(store.contains(&format!("{id}.png")));
        assert!(repo.get(id).unwrap().receipt_path.is_none());
    }

    #[tokio::test]
    async fn test_update_without_file_leaves_receipt_untouched() {
        let expense = existing_expense(Some("old.jpg"));
        let id = expense.id;
        let (service, repo, _) = service(
            MockExpenseRepository::with_expense(expense),
            MockReceiptStore::default(),
        );

        let mut changed = draft();
        changed.title = "Team dinner".to_string();
        let outcome = service.update(id, changed, None).await.unwrap();

        assert!(matches!(outcome.receipt, ReceiptOutcome::NotRequested));
        assert_eq!(outcome.expense.title, "Team dinner");
        assert_eq!(repo.get(id).unwrap().receipt_path.as_deref(), Some("old.jpg"));
    }

    #[tokio::test]
    async fn test_update_with_new_extension_orphans_old_blob() {
        let expense = existing_expense(None);
        let id = expense.id;
        let (service, repo, store) = service(
            MockExpenseRepository::with_expense(expense),
            MockReceiptStore::default(),
        );

        // Attach a jpg first, then replace with a png.
        let jpg = ReceiptFile {
            filename: "scan.jpg".to_string(),
            content_type: "image/jpeg".to_string(),
            bytes: b"jpg".to_vec(),
        };
        service.update(id, draft(), Some(jpg)).await.unwrap();
        let outcome = service.update(id, draft(), Some(png_file())).await.unwrap();

        let new_path = format!("{id}.png");
        assert!(matches!(&outcome.receipt, ReceiptOutcome::Linked { path } if *path == new_path));
        assert_eq!(
            repo.get(id).unwrap().receipt_path.as_deref(),
            Some(new_path.as_str())
        );
        // The old-extension blob is not cleaned up.
        assert!(store.contains(&format!("{id}.jpg")));
    }

    #[tokio::test]
    async fn test_update_failure_touches_no_blob() {
        let repo = MockExpenseRepository {
            fail_update: true,
            ..Default::default()
        };
        let (service, _, store) = service(repo, MockReceiptStore::default());

        let err = service
            .update(Uuid::new_v4(), draft(), Some(png_file()))
            .await
            .unwrap_err();

        assert!(matches!(err, ExpenseError::Persistence(_)));
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn test_remove_receipt() {
        let expense = existing_expense(Some("stale.jpg"));
        let id = expense.id;
        let (service, repo, store) = service(
            MockExpenseRepository::with_expense(expense),
            MockReceiptStore::default(),
        );
        store
            .upload("stale.jpg", b"bytes".to_vec(), "image/jpeg")
            .await
            .unwrap();

        let updated = service.remove_receipt(id).await.unwrap();

        assert!(updated.receipt_path.is_none());
        assert!(repo.get(id).unwrap().receipt_path.is_none());
        assert!(!store.contains("stale.jpg"));
    }

    #[tokio::test]
    async fn test_remove_receipt_fails_closed_on_blob_failure() {
        let expense = existing_expense(Some("keep.jpg"));
        let id = expense.id;
        let store = MockReceiptStore {
            fail_remove: true,
            ..Default::default()
        };
        let (service, repo, _) = service(MockExpenseRepository::with_expense(expense), store);

        let err = service.remove_receipt(id).await.unwrap_err();

        assert!(matches!(err, ExpenseError::Storage(_)));
        // Never clear the reference before the blob is confirmed gone.
        assert_eq!(repo.get(id).unwrap().receipt_path.as_deref(), Some("keep.jpg"));
    }

    #[tokio::test]
    async fn test_remove_receipt_without_receipt() {
        let expense = existing_expense(None);
        let id = expense.id;
        let (service, _, _) = service(
            MockExpenseRepository::with_expense(expense),
            MockReceiptStore::default(),
        );

        let err = service.remove_receipt(id).await.unwrap_err();
        assert!(matches!(err, ExpenseError::ReceiptMissing(_)));
    }

    #[tokio::test]
    async fn test_remove_receipt_unlink_failure_after_blob_gone() {
        let expense = existing_expense(Some("gone.jpg"));
        let id = expense.id;
        let repo = MockExpenseRepository {
            fail_set_path: true,
            ..Default::default()
        };
        repo.expenses.lock().unwrap().insert(id, expense);
        let (service, _, store) = service(repo, MockReceiptStore::default());
        store
            .upload("gone.jpg", b"bytes".to_vec(), "image/jpeg")
            .await
            .unwrap();

        let err = service.remove_receipt(id).await.unwrap_err();

        // Surfaced to the caller, but the state is consistent: no
        // dangling reference is possible because the blob removal
        // happened first. Retrying is safe.
        assert!(matches!(err, ExpenseError::Persistence(_)));
        assert!(!store.contains("gone.jpg"));
    }

    #[tokio::test]
    async fn test_delete_removes_blob_and_record() {
        let expense = existing_expense(Some("bye.jpg"));
        let id = expense.id;
        let (service, repo, store) = service(
            MockExpenseRepository::with_expense(expense),
            MockReceiptStore::default(),
        );
        store
            .upload("bye.jpg", b"bytes".to_vec(), "image/jpeg")
            .await
            .unwrap();

        service.delete(id).await.unwrap();

        assert!(repo.get(id).is_none());
        assert!(!store.contains("bye.jpg"));
    }

    #[tokio::test]
    async fn test_delete_proceeds_when_blob_removal_fails() {
        let expense = existing_expense(Some("stuck.jpg"));
        let id = expense.id;
        let store = MockReceiptStore {
            fail_remove: true,
            ..Default::default()
        };
        let (service, repo, _) = service(MockExpenseRepository::with_expense(expense), store);

        service.delete(id).await.unwrap();

        // Record gone even though the blob removal failed.
        assert!(repo.get(id).is_none());
    }

    #[tokio::test]
    async fn test_delete_unknown_id() {
        let (service, _, _) =
            service(MockExpenseRepository::default(), MockReceiptStore::default());

        let err = service.delete(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, ExpenseError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_receipt_url() {
        let expense = existing_expense(Some("abc.png"));
        let id = expense.id;
        let (service, _, _) = service(
            MockExpenseRepository::with_expense(expense),
            MockReceiptStore::default(),
        );

        let url = service.receipt_url(id).await.unwrap();
        assert_eq!(url, "mock://receipts/abc.png");
    }

    #[tokio::test]
    async fn test_receipt_url_without_receipt() {
        let expense = existing_expense(None);
        let id = expense.id;
        let (service, _, _) = service(
            MockExpenseRepository::with_expense(expense),
            MockReceiptStore::default(),
        );

        let err = service.receipt_url(id).await.unwrap_err();
        assert!(matches!(err, ExpenseError::ReceiptMissing(_)));
    }

    #[tokio::test]
    async fn test_validation_rejects_empty_title() {
        let (service, _, _) =
            service(MockExpenseRepository::default(), MockReceiptStore::default());

        let mut bad = draft();
        bad.title = "  ".to_string();
        let err = service.create(bad, None).await.unwrap_err();
        assert!(matches!(err, ExpenseError::Validation(_)));
    }

    #[tokio::test]
    async fn test_validation_rejects_negative_amount() {
        let (service, _, _) =
            service(MockExpenseRepository::default(), MockReceiptStore::default());

        let mut bad = draft();
        bad.amount = dec!(-1.00);
        let err = service.create(bad, None).await.unwrap_err();
        assert!(matches!(err, ExpenseError::Validation(_)));
    }

    #[test]
    fn test_receipt_key_normalizes_extension() {
        let id = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap();

        assert_eq!(receipt_key(id, "Receipt.PNG"), format!("{id}.png"));
        assert_eq!(receipt_key(id, "photo.jpeg"), format!("{id}.jpeg"));
        assert_eq!(receipt_key(id, "archive.tar.gz"), format!("{id}.gz"));
    }

    #[test]
    fn test_receipt_key_defaults_to_jpg() {
        let id = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap();

        assert_eq!(receipt_key(id, "no-extension"), format!("{id}.jpg"));
        assert_eq!(receipt_key(id, "trailing-dot."), format!("{id}.jpg"));
        assert_eq!(receipt_key(id, "weird.@!#"), format!("{id}.jpg"));
    }

    #[test]
    fn test_receipt_key_strips_non_alphanumerics() {
        let id = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap();

        assert_eq!(receipt_key(id, "scan.P N-G"), format!("{id}.png"));
    }
}
