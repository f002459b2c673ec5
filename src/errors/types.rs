//! Error type definitions for the portal proxy
//!
//! This module defines all error types used throughout the application,
//! providing a hierarchical error system that keeps upstream protocol
//! failures, store failures and request failures distinguishable.

use thiserror::Error;

/// Top-level application error type
///
/// This enum represents all possible errors that can occur in the application.
/// It uses `thiserror` to provide automatic error trait implementations and
/// proper error chaining.
#[derive(Error, Debug)]
pub enum AppError {
    /// Catalog store errors
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Upstream source errors (portal, panel, playlist)
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Validation errors
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Resource not found errors
    #[error("Not found: {resource} with id {id}")]
    NotFound { resource: String, id: String },

    /// Every fallback of a stream resolution was exhausted
    #[error("Resolution failed: {message}")]
    Resolution { message: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Operation already in progress errors
    #[error("Operation already in progress: {operation_type} on {resource}")]
    OperationInProgress {
        operation_type: String,
        resource: String,
    },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Catalog store specific errors
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// Store backend unavailable
    #[error("Store unavailable: {message}")]
    Unavailable { message: String },

    /// Data serialization/deserialization failures
    #[error("Serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    /// Constraint violations (duplicate identity, missing owner)
    #[error("Constraint violation: {constraint} - {message}")]
    ConstraintViolation { constraint: String, message: String },

    /// Record not found
    #[error("Record not found: {table} with {field} = {value}")]
    RecordNotFound {
        table: String,
        field: String,
        value: String,
    },
}

/// Upstream source specific errors
#[derive(Error, Debug)]
pub enum SourceError {
    /// Network timeouts
    #[error("Connection timeout: {url}")]
    Timeout { url: String },

    /// Connection resets, DNS failures and other transport errors
    #[error("Connection failed: {url} - {message}")]
    Connection { url: String, message: String },

    /// Authentication failures
    #[error("Authentication failed: {source_type} - {message}")]
    AuthenticationFailed {
        source_type: String,
        message: String,
    },

    /// Parsing errors for source data with no fallback left
    #[error("Parse error: {source_type} - {message}")]
    ParseError {
        source_type: String,
        message: String,
    },

    /// Playlist type cannot be served
    #[error("Unsupported playlist type: {playlist_type}")]
    UnsupportedType { playlist_type: String },

    /// Every listing strategy came back empty
    #[error("Catalog unavailable: {source_type} - {message}")]
    CatalogUnavailable {
        source_type: String,
        message: String,
    },

    /// HTTP errors from external sources
    #[error("HTTP error: {status} - {message}")]
    Http { status: u16, message: String },
}

/// Convenience methods for creating common error types
impl AppError {
    /// Create a validation error with a custom message
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found<R: Into<String>, I: Into<String>>(resource: R, id: I) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: id.into(),
        }
    }

    /// Create a resolution error
    pub fn resolution<S: Into<String>>(message: S) -> Self {
        Self::Resolution {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an operation in progress error
    pub fn operation_in_progress<O: Into<String>, R: Into<String>>(
        operation_type: O,
        resource: R,
    ) -> Self {
        Self::OperationInProgress {
            operation_type: operation_type.into(),
            resource: resource.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl SourceError {
    /// Create an authentication failed error
    pub fn auth_failed<S: Into<String>, M: Into<String>>(source_type: S, message: M) -> Self {
        Self::AuthenticationFailed {
            source_type: source_type.into(),
            message: message.into(),
        }
    }

    /// Create a parse error
    pub fn parse<S: Into<String>, M: Into<String>>(source_type: S, message: M) -> Self {
        Self::ParseError {
            source_type: source_type.into(),
            message: message.into(),
        }
    }

    /// Classify a reqwest failure, keeping credentials out of the message.
    pub fn from_transport(url: &str, err: &reqwest::Error) -> Self {
        let url = crate::utils::url::UrlUtils::obfuscate_credentials(url);
        if err.is_timeout() {
            Self::Timeout { url }
        } else if let Some(status) = err.status() {
            Self::Http {
                status: status.as_u16(),
                message: crate::utils::url::UrlUtils::obfuscate_credentials(&err.to_string()),
            }
        } else {
            Self::Connection {
                url,
                message: crate::utils::url::UrlUtils::obfuscate_credentials(&err.to_string()),
            }
        }
    }
}

impl RepositoryError {
    /// Create a record not found error
    pub fn record_not_found<T: Into<String>, F: Into<String>, V: Into<String>>(
        table: T,
        field: F,
        value: V,
    ) -> Self {
        Self::RecordNotFound {
            table: table.into(),
            field: field.into(),
            value: value.into(),
        }
    }
}
