//! Shared errors and configuration for Viatica.
//!
//! This crate provides common pieces used across all other crates:
//! - Application-wide error types with HTTP status mapping
//! - Configuration management (files + environment)

pub mod config;
pub mod error;

pub use config::{AppConfig, StorageSettings};
pub use error::{AppError, AppResult};
