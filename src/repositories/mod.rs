//! Catalog store
//!
//! This module provides the abstraction layer between the services and the
//! place playlists and channels are kept.
//!
//! # Architecture
//!
//! - [`CatalogStore`] is the contract every backend implements
//! - [`InMemoryCatalogStore`] is the bundled backend, seeded from configuration
//!
//! # Usage
//!
//! ```rust
//! use portal_proxy::repositories::{CatalogStore, InMemoryCatalogStore};
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = InMemoryCatalogStore::new();
//!     assert!(store.list_playlists().await?.is_empty());
//!     Ok(())
//! }
//! ```

pub mod memory;
pub mod traits;

// Re-export main traits and types
pub use memory::InMemoryCatalogStore;
pub use traits::*;
