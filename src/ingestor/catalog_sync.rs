//! Catalog sync
//!
//! Pulls a playlist's full catalog from its upstream and reconciles the
//! stored channel set with it. Each sync builds its own dialect client, so
//! syncs of different playlists share no state; two syncs of the same
//! playlist are refused while the first is running.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::UpstreamConfig;
use crate::errors::{AppError, AppResult};
use crate::models::{Channel, Playlist, PlaylistStatus, PlaylistSyncUpdate};
use crate::repositories::CatalogStore;
use crate::sources::SourceClientFactory;
use crate::utils::StandardHttpClient;

/// Result of one successful sync.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SyncOutcome {
    pub channel_count: usize,
    pub status: PlaylistStatus,
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
}

pub struct CatalogSyncService {
    store: Arc<dyn CatalogStore>,
    http: StandardHttpClient,
    upstream: UpstreamConfig,
    in_progress: Arc<Mutex<HashSet<String>>>,
}

/// Releases the playlist's in-progress slot when dropped.
struct SyncGuard {
    playlist_id: String,
    in_progress: Arc<Mutex<HashSet<String>>>,
}

impl Drop for SyncGuard {
    fn drop(&mut self) {
        if let Ok(mut running) = self.in_progress.lock() {
            running.remove(&self.playlist_id);
        }
    }
}

impl CatalogSyncService {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        http: StandardHttpClient,
        upstream: UpstreamConfig,
    ) -> Self {
        Self {
            store,
            http,
            upstream,
            in_progress: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    fn try_start(&self, playlist: &Playlist) -> AppResult<SyncGuard> {
        let mut running = self
            .in_progress
            .lock()
            .map_err(|_| AppError::internal("sync state lock poisoned"))?;
        if !running.insert(playlist.id.clone()) {
            warn!(
                "Skipping sync for '{}' - already in progress",
                playlist.name
            );
            return Err(AppError::operation_in_progress("catalog sync", &playlist.name));
        }
        Ok(SyncGuard {
            playlist_id: playlist.id.clone(),
            in_progress: self.in_progress.clone(),
        })
    }

    /// Sync one playlist.
    ///
    /// On failure the playlist is marked `error` with the message; channels
    /// already written stay written.
    pub async fn sync_playlist(&self, playlist_id: &str) -> AppResult<SyncOutcome> {
        let playlist = self
            .store
            .get_playlist(playlist_id)
            .await?
            .ok_or_else(|| AppError::not_found("playlist", playlist_id))?;
        let _guard = self.try_start(&playlist)?;

        let start_time = Instant::now();
        info!("Starting catalog sync for '{}' ({})", playlist.name, playlist.id);

        match self.run_sync(&playlist).await {
            Ok(outcome) => {
                info!(
                    "Catalog sync completed for '{}' in {:.2}s: {} channels ({} new, {} changed, {} removed)",
                    playlist.name,
                    start_time.elapsed().as_secs_f64(),
                    outcome.channel_count,
                    outcome.inserted,
                    outcome.updated,
                    outcome.deleted
                );
                Ok(outcome)
            }
            Err(e) => {
                error!("Catalog sync failed for '{}': {}", playlist.name, e);
                let update = PlaylistSyncUpdate {
                    status: PlaylistStatus::Error,
                    last_sync: Some(Utc::now()),
                    error: Some(e.to_string()),
                    ..Default::default()
                };
                if let Err(record_err) = self
                    .store
                    .update_playlist_sync_result(&playlist.id, update)
                    .await
                {
                    error!(
                        "Failed to record sync error for '{}': {}",
                        playlist.name, record_err
                    );
                }
                Err(e)
            }
        }
    }

    async fn run_sync(&self, playlist: &Playlist) -> AppResult<SyncOutcome> {
        let playlist_type = playlist.effective_type()?;
        let client = SourceClientFactory::create(playlist, playlist_type, &self.http, &self.upstream)?;
        let snapshot = client.fetch_catalog().await?;

        let now = Utc::now();
        let previous: HashMap<String, Channel> = self
            .store
            .list_channels(&playlist.id)
            .await?
            .into_iter()
            .map(|channel| (channel.channel_id.clone(), channel))
            .collect();

        let mut seen = HashSet::new();
        let channels: Vec<Channel> = snapshot
            .channels
            .into_iter()
            .filter(|source| seen.insert(source.channel_id.clone()))
            .map(|source| {
                let setting = playlist.setting_for(&source.channel_id);
                let stored = previous.get(&source.channel_id);
                Channel::from_source(&playlist.id, source, setting, stored, now)
            })
            .collect();
        let keep: Vec<String> = channels.iter().map(|c| c.channel_id.clone()).collect();

        let deleted = self
            .store
            .delete_channels_not_in(&playlist.id, &keep)
            .await?;
        let summary = self.store.upsert_channels(&playlist.id, channels).await?;

        let channel_count = keep.len();
        self.store
            .update_playlist_sync_result(
                &playlist.id,
                PlaylistSyncUpdate {
                    status: PlaylistStatus::Active,
                    last_sync: Some(now),
                    channel_count: Some(channel_count),
                    error: None,
                    sync_data: Some(snapshot.sync_data),
                    detected_type: Some(playlist_type),
                },
            )
            .await?;

        Ok(SyncOutcome {
            channel_count,
            status: PlaylistStatus::Active,
            inserted: summary.inserted,
            updated: summary.updated,
            deleted,
        })
    }

    /// Sync every active playlist in turn. Failures are logged and recorded
    /// on the playlist; the remaining playlists still run.
    pub async fn sync_all_active(&self) -> AppResult<usize> {
        let mut synced = 0;
        for playlist in self.store.list_playlists().await? {
            if !playlist.is_active {
                continue;
            }
            match self.sync_playlist(&playlist.id).await {
                Ok(_) => synced += 1,
                Err(e) => warn!("Scheduled sync of '{}' failed: {}", playlist.name, e),
            }
        }
        Ok(synced)
    }
}
