//! Centralized error handling for the portal proxy
//!
//! This module unifies error types across the dialect clients, the catalog
//! store and the web layer, so every failure reaches the HTTP surface with a
//! distinct kind instead of a generic 500.
//!
//! # Error Categories
//!
//! - **Source Errors**: upstream portal, panel and playlist failures
//! - **Repository Errors**: catalog store failures
//! - **Resolution Errors**: no playable URL left after every fallback
//! - **Validation Errors**: bad input or playlist invariants
//!
//! # Usage
//!
//! ```rust
//! use portal_proxy::errors::{AppError, AppResult};
//!
//! async fn example_function() -> AppResult<String> {
//!     Err(AppError::validation("macAddress is required"))
//! }
//! ```

pub mod types;

pub use types::*;

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Convenience type alias for Repository Results
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Convenience type alias for Source Results
pub type SourceResult<T> = Result<T, SourceError>;
