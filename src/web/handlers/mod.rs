//! Web handlers module
//!
//! HTTP request handlers organized by domain. Handlers stay thin and hand
//! the work to the services in [`AppState`](crate::web::AppState).

pub mod health;
pub mod playlists;
pub mod proxy;
pub mod streams;
