//! Source client trait definitions
//!
//! This module defines the abstractions shared by the MAG/Stalker, Xtream and
//! M3U clients: the catalog source trait used by sync and connection tests,
//! and the explicit degraded-vs-complete result type for best-effort calls.

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::SourceResult;
use crate::models::{SourceChannel, SourceType};

/// Result of a best-effort upstream call.
///
/// `Degraded` still carries a usable value (an empty list, a default
/// object) together with the reason the real one could not be obtained.
/// Fatal failures are reported through `SourceError` instead.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Complete(T),
    Degraded { value: T, reason: String },
}

impl<T> Outcome<T> {
    pub fn degraded<S: Into<String>>(value: T, reason: S) -> Self {
        Self::Degraded {
            value,
            reason: reason.into(),
        }
    }

    pub fn value(&self) -> &T {
        match self {
            Self::Complete(value) | Self::Degraded { value, .. } => value,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Self::Complete(value) | Self::Degraded { value, .. } => value,
        }
    }

    pub fn degraded_reason(&self) -> Option<&str> {
        match self {
            Self::Complete(_) => None,
            Self::Degraded { reason, .. } => Some(reason),
        }
    }
}

/// Everything one full listing of an upstream produced.
#[derive(Debug, Clone)]
pub struct CatalogSnapshot {
    pub channels: Vec<SourceChannel>,
    /// Dialect specific metadata recorded on the playlist (`syncData`).
    pub sync_data: Value,
}

/// A dialect client able to list a full channel catalog.
///
/// Implementations carry per-call state only; the factory builds a fresh
/// instance for every sync or connection test.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    fn source_type(&self) -> SourceType;

    /// Fetch the complete catalog. Fails only when no usable listing exists.
    async fn fetch_catalog(&self) -> SourceResult<CatalogSnapshot>;

    /// Cheap reachability and credential check for the admin surface.
    async fn test_connection(&self) -> SourceResult<Value>;
}
