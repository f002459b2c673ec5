//! Utility modules for the portal proxy
//!
//! This module contains reusable utilities that can be used
//! across different parts of the system.

pub mod first_success;
pub mod http_client;
pub mod url;

// Re-export commonly used types for convenience
pub use first_success::first_successful;
pub use http_client::StandardHttpClient;
pub use url::UrlUtils;
