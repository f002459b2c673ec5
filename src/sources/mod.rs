//! Upstream dialect clients
//!
//! One client per upstream protocol, all behind the [`CatalogSource`] trait:
//!
//! - **MAG/Stalker** ([`mag::MagClient`]): set-top-box emulation, handshake
//!   and token negotiation, `create_link`, multi-strategy channel listing
//! - **Xtream Codes** ([`xtream::XtreamClient`]): `player_api.php`
//!   authentication and live stream listing
//! - **M3U** ([`m3u::M3uClient`]): playlist download and `#EXTINF` parsing
//!
//! Portal bodies are decoded with [`portal_response::decode_portal_response`],
//! which tolerates JS callback wrappers and stray markup.
//!
//! # Usage
//!
//! ```rust,no_run
//! use portal_proxy::config::UpstreamConfig;
//! use portal_proxy::models::Playlist;
//! use portal_proxy::sources::SourceClientFactory;
//! use portal_proxy::utils::StandardHttpClient;
//!
//! async fn example(playlist: &Playlist) -> Result<(), Box<dyn std::error::Error>> {
//!     let upstream = UpstreamConfig::default();
//!     let http = StandardHttpClient::with_connection_timeout(upstream.connect_timeout)?;
//!     let client =
//!         SourceClientFactory::create(playlist, playlist.effective_type()?, &http, &upstream)?;
//!     let snapshot = client.fetch_catalog().await?;
//!     println!("Listed {} channels", snapshot.channels.len());
//!     Ok(())
//! }
//! ```

pub mod factory;
pub mod m3u;
pub mod mag;
pub mod portal_response;
pub mod traits;
pub mod xtream;

pub use factory::{ConnectionParams, SourceClientFactory};
pub use portal_response::{PortalResponse, decode_portal_response};
pub use traits::*;
