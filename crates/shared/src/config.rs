//! Application configuration management.

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Receipt storage configuration.
    pub storage: StorageSettings,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// Receipt storage settings.
///
/// Deserialized here so the config layer stays free of storage dependencies;
/// the server bin maps these into the core storage provider.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    /// Provider kind: `s3`, `azure_blob` or `local`.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Bucket or container holding receipt objects.
    #[serde(default = "default_bucket")]
    pub bucket: String,
    /// S3 endpoint URL (s3 provider only).
    #[serde(default)]
    pub endpoint: String,
    /// Access key id (s3) or account name (azure_blob).
    #[serde(default)]
    pub access_key_id: String,
    /// Secret access key (s3) or account key (azure_blob).
    #[serde(default)]
    pub secret_access_key: String,
    /// Region (s3 provider only).
    #[serde(default = "default_region")]
    pub region: String,
    /// Root directory (local provider only).
    #[serde(default = "default_local_root")]
    pub local_root: String,
    /// Base URL for public receipt links; derived from the provider when unset.
    #[serde(default)]
    pub public_base_url: Option<String>,
}

fn default_provider() -> String {
    "local".to_string()
}

fn default_bucket() -> String {
    "receipts".to_string()
}

fn default_region() -> String {
    "auto".to_string()
}

fn default_local_root() -> String {
    "./data/receipts".to_string()
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("VIATICA").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        assert_eq!(default_host(), "0.0.0.0");
        assert_eq!(default_port(), 8080);
        assert_eq!(default_max_connections(), 10);
        assert_eq!(default_min_connections(), 1);
        assert_eq!(default_provider(), "local");
        assert_eq!(default_bucket(), "receipts");
    }

    #[test]
    fn test_storage_settings_deserialize_minimal() {
        let settings: StorageSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings.provider, "local");
        assert_eq!(settings.bucket, "receipts");
        assert_eq!(settings.local_root, "./data/receipts");
        assert!(settings.public_base_url.is_none());
    }
}
