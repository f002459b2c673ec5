//! Customer-facing channel listing
//!
//! Visible channels only, with the playlist's channel settings applied on
//! top of the stored record and ordered by custom position.

use std::sync::Arc;

use serde::Serialize;

use crate::errors::{AppError, AppResult};
use crate::models::{Channel, Playlist, PlaylistType, SourceType};
use crate::models::channel::DEFAULT_CHANNEL_ORDER;
use crate::repositories::CatalogStore;

/// One channel as presented to end clients.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChannelView {
    pub playlist_id: String,
    pub channel_id: String,
    pub name: String,
    pub logo: String,
    pub group: String,
    pub order: i32,
    pub epg_id: String,
    pub is_hd: bool,
    pub source_type: SourceType,
    pub playlist_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playlist_type: Option<PlaylistType>,
}

impl ChannelView {
    fn new(playlist: &Playlist, channel: &Channel) -> Self {
        let setting = playlist.setting_for(&channel.channel_id);
        let name = setting
            .and_then(|s| s.custom_name.as_deref())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| channel.display_name());
        let logo = setting
            .and_then(|s| s.custom_logo.as_deref())
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| channel.display_logo());
        let order = setting
            .and_then(|s| s.custom_order)
            .or(channel.custom_order)
            .unwrap_or(DEFAULT_CHANNEL_ORDER);

        Self {
            playlist_id: playlist.id.clone(),
            channel_id: channel.channel_id.clone(),
            name: name.to_string(),
            logo: logo.to_string(),
            group: channel.group.clone(),
            order,
            epg_id: channel.epg_id.clone(),
            is_hd: channel.is_hd,
            source_type: channel.source_type,
            playlist_name: playlist.name.clone(),
            playlist_type: playlist.playlist_type,
        }
    }
}

pub struct ChannelViewService {
    store: Arc<dyn CatalogStore>,
}

impl ChannelViewService {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self { store }
    }

    /// Visible channels of one playlist.
    pub async fn for_playlist(&self, playlist_id: &str) -> AppResult<Vec<ChannelView>> {
        let playlist = self
            .store
            .get_playlist(playlist_id)
            .await?
            .ok_or_else(|| AppError::not_found("playlist", playlist_id))?;
        let mut views = self.views_of(&playlist).await?;
        sort_views(&mut views);
        Ok(views)
    }

    /// Visible channels of every active playlist, merged and ordered.
    pub async fn for_active_playlists(&self) -> AppResult<Vec<ChannelView>> {
        let mut views = Vec::new();
        for playlist in self.store.list_playlists().await? {
            if playlist.is_active {
                views.extend(self.views_of(&playlist).await?);
            }
        }
        sort_views(&mut views);
        Ok(views)
    }

    async fn views_of(&self, playlist: &Playlist) -> AppResult<Vec<ChannelView>> {
        Ok(self
            .store
            .list_channels(&playlist.id)
            .await?
            .iter()
            .filter(|channel| channel.is_visible)
            .map(|channel| ChannelView::new(playlist, channel))
            .collect())
    }
}

// Stable, so equal orders keep store order
fn sort_views(views: &mut [ChannelView]) {
    views.sort_by_key(|view| view.order);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChannelSetting, SourceChannel};
    use crate::repositories::InMemoryCatalogStore;
    use chrono::Utc;

    #[tokio::test]
    async fn applies_overrides_and_hides_invisible() {
        let mut playlist: Playlist = serde_json::from_value(serde_json::json!({
            "id": "p1",
            "name": "lists",
            "sourceUrl": "http://lists.example/tv.m3u",
        }))
        .unwrap();
        playlist.channel_settings = vec![ChannelSetting {
            channel_id: "b".into(),
            is_visible: true,
            custom_name: Some("Bee".into()),
            custom_logo: None,
            custom_order: Some(1),
        }];
        let store = InMemoryCatalogStore::with_playlists([playlist]).await.unwrap();

        let now = Utc::now();
        let make = |id: &str| {
            Channel::from_source(
                "p1",
                SourceChannel::new(SourceType::M3u, id.into(), id.to_uppercase()),
                None,
                None,
                now,
            )
        };
        let mut hidden = make("c");
        hidden.is_visible = false;
        store
            .upsert_channels("p1", vec![make("a"), make("b"), hidden])
            .await
            .unwrap();

        let views = ChannelViewService::new(Arc::new(store))
            .for_playlist("p1")
            .await
            .unwrap();
        let names: Vec<_> = views.iter().map(|v| (v.name.as_str(), v.order)).collect();
        assert_eq!(names, vec![("Bee", 1), ("A", DEFAULT_CHANNEL_ORDER)]);
    }
}
