//! Shared types, errors, and configuration for Bankcore.
//!
//! This crate provides common types used across all other crates:
//! - Fixed-point money types
//! - Typed IDs for type-safe entity references
//! - Application-wide error types
//! - Configuration management

pub mod config;
pub mod error;
pub mod types;

pub use config::{AppConfig, DatabaseConfig, LedgerConfig, LogConfig};
pub use error::AppError;
