//! Catalog ingestion
//!
//! [`CatalogSyncService`] reconciles stored channels with an upstream's
//! listing; [`SyncScheduler`] runs it for every active playlist on a cron
//! schedule.

pub mod catalog_sync;
pub mod scheduler;

pub use catalog_sync::{CatalogSyncService, SyncOutcome};
pub use scheduler::SyncScheduler;
