//! In-memory catalog store
//!
//! Backs the store contract with a `tokio::sync::RwLock`-guarded map. The
//! service seeds it from the `[[playlists]]` configuration entries at startup.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::traits::{CatalogStore, UpsertSummary};
use crate::errors::{RepositoryError, RepositoryResult};
use crate::models::{Channel, Playlist, PlaylistSyncUpdate};

#[derive(Default)]
struct CatalogState {
    playlists: HashMap<String, Playlist>,
    /// Channels per playlist, ordered by channel id
    channels: HashMap<String, BTreeMap<String, Channel>>,
}

#[derive(Default)]
pub struct InMemoryCatalogStore {
    state: RwLock<CatalogState>,
}

impl InMemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn with_playlists(playlists: impl IntoIterator<Item = Playlist>) -> RepositoryResult<Self> {
        let store = Self::new();
        for playlist in playlists {
            store.insert_playlist(playlist).await?;
        }
        Ok(store)
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalogStore {
    async fn get_playlist(&self, playlist_id: &str) -> RepositoryResult<Option<Playlist>> {
        Ok(self.state.read().await.playlists.get(playlist_id).cloned())
    }

    async fn list_playlists(&self) -> RepositoryResult<Vec<Playlist>> {
        let state = self.state.read().await;
        let mut playlists: Vec<Playlist> = state.playlists.values().cloned().collect();
        playlists.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(playlists)
    }

    async fn insert_playlist(&self, playlist: Playlist) -> RepositoryResult<()> {
        if playlist.id.trim().is_empty() {
            return Err(RepositoryError::ConstraintViolation {
                constraint: "playlist_id".to_string(),
                message: format!("playlist '{}' has an empty id", playlist.name),
            });
        }
        let mut state = self.state.write().await;
        state.channels.entry(playlist.id.clone()).or_default();
        state.playlists.insert(playlist.id.clone(), playlist);
        Ok(())
    }

    async fn get_channel(
        &self,
        playlist_id: &str,
        channel_id: &str,
    ) -> RepositoryResult<Option<Channel>> {
        Ok(self
            .state
            .read()
            .await
            .channels
            .get(playlist_id)
            .and_then(|channels| channels.get(channel_id))
            .cloned())
    }

    async fn list_channels(&self, playlist_id: &str) -> RepositoryResult<Vec<Channel>> {
        Ok(self
            .state
            .read()
            .await
            .channels
            .get(playlist_id)
            .map(|channels| channels.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn upsert_channels(
        &self,
        playlist_id: &str,
        channels: Vec<Channel>,
    ) -> RepositoryResult<UpsertSummary> {
        let mut state = self.state.write().await;
        if !state.playlists.contains_key(playlist_id) {
            return Err(RepositoryError::record_not_found("playlists", "id", playlist_id));
        }
        let stored = state.channels.entry(playlist_id.to_string()).or_default();

        let mut summary = UpsertSummary::default();
        for channel in channels {
            if channel.playlist_id != playlist_id {
                return Err(RepositoryError::ConstraintViolation {
                    constraint: "channel_playlist".to_string(),
                    message: format!(
                        "channel {} belongs to playlist {}",
                        channel.channel_id, channel.playlist_id
                    ),
                });
            }
            match stored.get(&channel.channel_id) {
                Some(existing) if existing.same_content(&channel) => summary.unchanged += 1,
                Some(_) => {
                    summary.updated += 1;
                    stored.insert(channel.channel_id.clone(), channel);
                }
                None => {
                    summary.inserted += 1;
                    stored.insert(channel.channel_id.clone(), channel);
                }
            }
        }
        debug!(
            "Upserted channels for {}: {} inserted, {} updated, {} unchanged",
            playlist_id, summary.inserted, summary.updated, summary.unchanged
        );
        Ok(summary)
    }

    async fn delete_channels_not_in(
        &self,
        playlist_id: &str,
        keep: &[String],
    ) -> RepositoryResult<usize> {
        let keep: HashSet<&str> = keep.iter().map(String::as_str).collect();
        let mut state = self.state.write().await;
        let Some(stored) = state.channels.get_mut(playlist_id) else {
            return Ok(0);
        };
        let before = stored.len();
        stored.retain(|channel_id, _| keep.contains(channel_id.as_str()));
        Ok(before - stored.len())
    }

    async fn update_playlist_sync_result(
        &self,
        playlist_id: &str,
        update: PlaylistSyncUpdate,
    ) -> RepositoryResult<()> {
        let mut state = self.state.write().await;
        let playlist = state
            .playlists
            .get_mut(playlist_id)
            .ok_or_else(|| RepositoryError::record_not_found("playlists", "id", playlist_id))?;

        playlist.status = update.status;
        playlist.last_sync = update.last_sync.or(playlist.last_sync);
        playlist.error = update.error;
        if let Some(count) = update.channel_count {
            playlist.channel_count = count;
        }
        if let Some(sync_data) = update.sync_data {
            playlist.sync_data = sync_data;
        }
        if playlist.playlist_type.is_none() {
            playlist.playlist_type = update.detected_type;
        }
        Ok(())
    }
}
