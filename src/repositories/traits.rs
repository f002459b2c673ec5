//! Catalog store contract
//!
//! The store is the only shared mutable resource in the service. Catalog
//! sync writes it; stream resolution only reads from it.

use async_trait::async_trait;

use crate::errors::RepositoryResult;
use crate::models::{Channel, Playlist, PlaylistSyncUpdate};

/// Counts reported by [`CatalogStore::upsert_channels`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertSummary {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
}

/// Persistence contract for playlists and their channels.
///
/// # Examples
///
/// ```rust
/// use portal_proxy::repositories::{CatalogStore, InMemoryCatalogStore};
///
/// async fn example(store: &InMemoryCatalogStore) -> Result<(), Box<dyn std::error::Error>> {
///     if let Some(playlist) = store.get_playlist("portal").await? {
///         let channels = store.list_channels(&playlist.id).await?;
///         println!("{} has {} channels", playlist.name, channels.len());
///     }
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn get_playlist(&self, playlist_id: &str) -> RepositoryResult<Option<Playlist>>;

    async fn list_playlists(&self) -> RepositoryResult<Vec<Playlist>>;

    /// Insert or replace a playlist record.
    async fn insert_playlist(&self, playlist: Playlist) -> RepositoryResult<()>;

    async fn get_channel(
        &self,
        playlist_id: &str,
        channel_id: &str,
    ) -> RepositoryResult<Option<Channel>>;

    async fn list_channels(&self, playlist_id: &str) -> RepositoryResult<Vec<Channel>>;

    /// Insert new channels and replace existing ones keyed by
    /// `(playlist_id, channel_id)`. Records whose content is unchanged keep
    /// their stored timestamp.
    async fn upsert_channels(
        &self,
        playlist_id: &str,
        channels: Vec<Channel>,
    ) -> RepositoryResult<UpsertSummary>;

    /// Delete every channel of the playlist whose id is not in `keep`.
    /// Returns the number of deleted channels.
    async fn delete_channels_not_in(
        &self,
        playlist_id: &str,
        keep: &[String],
    ) -> RepositoryResult<usize>;

    async fn update_playlist_sync_result(
        &self,
        playlist_id: &str,
        update: PlaylistSyncUpdate,
    ) -> RepositoryResult<()>;
}
