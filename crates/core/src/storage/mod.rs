//! Receipt blob storage.
//!
//! Provides a vendor-agnostic object store for receipt artifacts using
//! Apache OpenDAL. Receipts live in a single logical container and are
//! keyed by `{expense_id}.{ext}`.

mod config;
mod error;
mod service;

pub use config::{StorageConfig, StorageProvider};
pub use error::StorageError;
pub use service::StorageService;

/// Object store contract for receipt artifacts.
///
/// Implemented by [`StorageService`] over OpenDAL; test code substitutes
/// in-memory fakes to simulate partial failures.
pub trait ReceiptStore: Send + Sync {
    /// Store an object at `key`, overwriting any existing object (upsert).
    ///
    /// The overwrite is atomic from the caller's perspective: readers never
    /// observe a partially written object.
    fn upload(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> impl std::future::Future<Output = Result<(), StorageError>> + Send;

    /// Fetch the object at `key`.
    ///
    /// Fails with [`StorageError::NotFound`] if the object does not exist.
    fn download(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<Vec<u8>, StorageError>> + Send;

    /// Delete the object at `key`.
    ///
    /// Removing a non-existent key is a no-op success (idempotent).
    fn remove(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<(), StorageError>> + Send;

    /// Resolve a public retrieval URL for `key`.
    ///
    /// Never fails and is not existence-checked; a missing object yields a
    /// URL that 404s downstream.
    fn public_url(&self, key: &str) -> String;
}
