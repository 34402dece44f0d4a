//! Storage service implementation using Apache OpenDAL.

use opendal::{ErrorKind, Operator, services};

use super::config::{StorageConfig, StorageProvider};
use super::error::StorageError;
use super::ReceiptStore;

/// Object storage for receipt artifacts.
pub struct StorageService {
    operator: Operator,
    config: StorageConfig,
}

impl StorageService {
    /// Create a new storage service from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage provider cannot be initialized.
    pub fn from_config(config: StorageConfig) -> Result<Self, StorageError> {
        let operator = Self::create_operator(&config.provider)?;
        Ok(Self { operator, config })
    }

    /// Create OpenDAL operator from provider config.
    fn create_operator(provider: &StorageProvider) -> Result<Operator, StorageError> {
        match provider {
            StorageProvider::S3 {
                endpoint,
                bucket,
                access_key_id,
                secret_access_key,
                region,
            } => {
                let builder = services::S3::default()
                    .endpoint(endpoint)
                    .bucket(bucket)
                    .access_key_id(access_key_id)
                    .secret_access_key(secret_access_key)
                    .region(region);

                Operator::new(builder)
                    .map_err(|e| StorageError::configuration(e.to_string()))?
                    .finish()
                    .pipe(Ok)
            }
            StorageProvider::AzureBlob {
                account,
                access_key,
                container,
            } => {
                let builder = services::Azblob::default()
                    .account_name(account)
                    .account_key(access_key)
                    .container(container);

                Operator::new(builder)
                    .map_err(|e| StorageError::configuration(e.to_string()))?
                    .finish()
                    .pipe(Ok)
            }
            StorageProvider::LocalFs { root } => {
                let builder = services::Fs::default().root(
                    root.to_str()
                        .ok_or_else(|| StorageError::configuration("invalid path"))?,
                );

                Operator::new(builder)
                    .map_err(|e| StorageError::configuration(e.to_string()))?
                    .finish()
                    .pipe(Ok)
            }
            StorageProvider::Memory => {
                let builder = services::Memory::default();

                Operator::new(builder)
                    .map_err(|e| StorageError::configuration(e.to_string()))?
                    .finish()
                    .pipe(Ok)
            }
        }
    }

    /// Check if an object exists in storage.
    pub async fn exists(&self, key: &str) -> bool {
        match self.operator.stat(key).await {
            Ok(_) => true,
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(_) => false,
        }
    }

    /// Get the storage provider name.
    #[must_use]
    pub fn provider_name(&self) -> &'static str {
        self.config.provider.name()
    }

    /// Get the bucket/container name.
    #[must_use]
    pub fn bucket(&self) -> &str {
        self.config.provider.bucket()
    }

    /// Get the configuration.
    #[must_use]
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }
}

impl ReceiptStore for StorageService {
    async fn upload(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        self.operator
            .write_with(key, bytes)
            .content_type(content_type)
            .await
            .map(|_| ())
            .map_err(StorageError::from)
    }

    async fn download(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let buffer = self.operator.read(key).await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                StorageError::not_found(key)
            } else {
                StorageError::from(e)
            }
        })?;

        Ok(buffer.to_vec())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        // OpenDAL delete is idempotent; a missing key is a no-op success.
        self.operator.delete(key).await.map_err(StorageError::from)
    }

    fn public_url(&self, key: &str) -> String {
        if let Some(base) = &self.config.public_base_url {
            return format!("{}/{key}", base.trim_end_matches('/'));
        }

        match &self.config.provider {
            StorageProvider::S3 {
                endpoint, bucket, ..
            } => format!("{}/{bucket}/{key}", endpoint.trim_end_matches('/')),
            StorageProvider::AzureBlob {
                account, container, ..
            } => format!("https://{account}.blob.core.windows.net/{container}/{key}"),
            StorageProvider::LocalFs { root } => {
                format!("file://{}/{key}", root.display())
            }
            StorageProvider::Memory => format!("memory://{key}"),
        }
    }
}

/// Extension trait for pipe operator.
trait Pipe: Sized {
    fn pipe<F, R>(self, f: F) -> R
    where
        F: FnOnce(Self) -> R,
    {
        f(self)
    }
}

impl<T> Pipe for T {}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_service() -> StorageService {
        StorageService::from_config(StorageConfig::new(StorageProvider::Memory))
            .expect("memory provider should initialize")
    }

    #[tokio::test]
    async fn test_upload_download_roundtrip() {
        let service = memory_service();

        service
            .upload("abc.jpg", b"receipt bytes".to_vec(), "image/jpeg")
            .await
            .expect("upload should succeed");

        let bytes = service.download("abc.jpg").await.expect("object exists");
        assert_eq!(bytes, b"receipt bytes");
        assert!(service.exists("abc.jpg").await);
    }

    #[tokio::test]
    async fn test_upload_overwrites_in_place() {
        let service = memory_service();

        service
            .upload("abc.jpg", b"first".to_vec(), "image/jpeg")
            .await
            .unwrap();
        service
            .upload("abc.jpg", b"second".to_vec(), "image/jpeg")
            .await
            .unwrap();

        let bytes = service.download("abc.jpg").await.unwrap();
        assert_eq!(bytes, b"second");
    }

    #[tokio::test]
    async fn test_download_missing_is_not_found() {
        let service = memory_service();

        let err = service.download("missing.png").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_remove_missing_is_noop() {
        let service = memory_service();

        service
            .remove("never-uploaded.jpg")
            .await
            .expect("removing a missing key is a no-op success");
    }

    #[tokio::test]
    async fn test_remove_deletes_object() {
        let service = memory_service();

        service
            .upload("abc.png", b"data".to_vec(), "image/png")
            .await
            .unwrap();
        service.remove("abc.png").await.unwrap();

        assert!(!service.exists("abc.png").await);
    }

    #[test]
    fn test_public_url_prefers_configured_base() {
        let config = StorageConfig::new(StorageProvider::Memory)
            .with_public_base_url("https://cdn.example.com/receipts/");
        let service = StorageService::from_config(config).unwrap();

        assert_eq!(
            service.public_url("abc.jpg"),
            "https://cdn.example.com/receipts/abc.jpg"
        );
    }

    #[test]
    fn test_public_url_derived_from_s3() {
        let config = StorageConfig::new(StorageProvider::s3(
            "https://account.r2.cloudflarestorage.com",
            "receipts",
            "key",
            "secret",
            "auto",
        ));
        let service = StorageService::from_config(config).unwrap();

        assert_eq!(
            service.public_url("abc.jpg"),
            "https://account.r2.cloudflarestorage.com/receipts/abc.jpg"
        );
    }

    #[test]
    fn test_public_url_never_checks_existence() {
        // Resolution is purely syntactic; a missing object yields a URL
        // that 404s downstream.
        let service = memory_service();
        assert_eq!(service.public_url("ghost.jpg"), "memory://ghost.jpg");
    }
}
