//! Core business logic for Viatica.
//!
//! This crate contains pure business logic with ZERO web or database dependencies.
//! All domain types, the receipt lifecycle protocols, and export assembly live here.
//!
//! # Modules
//!
//! - `expense` - Expense records and the receipt lifecycle coordinator
//! - `storage` - Receipt blob storage over OpenDAL
//! - `export` - CSV + receipts export bundle

pub mod expense;
pub mod export;
pub mod storage;
