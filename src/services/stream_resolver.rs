//! Stream resolution
//!
//! Turns a stored channel reference into a URL that can be fetched right
//! now. Classification picks the route; Xtream and passthrough routes are
//! pure string work, the MAG route negotiates a fresh link with the portal.
//!
//! The resolver never writes to the catalog store. A link minted by the
//! portal is handed to the caller and forgotten, so every request
//! renegotiates from the stored cmd.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::UpstreamConfig;
use crate::errors::{AppError, AppResult};
use crate::models::{Dialect, Playlist, ResolvedStream};
use crate::repositories::CatalogStore;
use crate::sources::mag::MagClient;
use crate::streaming::{ClassifierInput, StreamRoute, classify};
use crate::utils::{StandardHttpClient, UrlUtils};

/// Message returned when no fallback produced a URL.
pub const NO_VALID_URL: &str = "No valid URL found in cmd";

pub struct StreamResolver {
    store: Arc<dyn CatalogStore>,
    http: StandardHttpClient,
    upstream: UpstreamConfig,
}

impl StreamResolver {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        http: StandardHttpClient,
        upstream: UpstreamConfig,
    ) -> Self {
        Self {
            store,
            http,
            upstream,
        }
    }

    /// Resolve a channel of a playlist.
    ///
    /// When `cmd` is absent the stored channel's cmd (or URL) is used.
    /// Missing playlists and channels surface as `NotFound`; a portal that
    /// refuses to mint a link degrades to the stored URL flagged stale.
    pub async fn resolve(
        &self,
        playlist_id: &str,
        channel_id: &str,
        cmd: Option<&str>,
    ) -> AppResult<ResolvedStream> {
        let playlist = self
            .store
            .get_playlist(playlist_id)
            .await?
            .ok_or_else(|| AppError::not_found("playlist", playlist_id))?;

        let cmd = match cmd.map(str::trim).filter(|c| !c.is_empty()) {
            Some(cmd) => cmd.to_string(),
            None => self
                .store
                .get_channel(playlist_id, channel_id)
                .await?
                .ok_or_else(|| AppError::not_found("channel", channel_id))?
                .stream_reference()
                .to_string(),
        };

        self.resolve_reference(&playlist, channel_id, &cmd).await
    }

    /// Resolve an explicit reference against a playlist.
    pub async fn resolve_reference(
        &self,
        playlist: &Playlist,
        channel_id: &str,
        cmd: &str,
    ) -> AppResult<ResolvedStream> {
        let classification = classify(&ClassifierInput {
            cmd,
            channel_id,
            playlist,
            playlist_type: playlist.playlist_type.or_else(|| playlist.detect_type()),
        });
        debug!(
            target = "stream.resolve",
            playlist_id = %playlist.id,
            channel_id,
            reasons = ?classification.reasons,
            "classified stream reference"
        );

        let dialect = classification.route.dialect();
        let resolved = match classification.route {
            StreamRoute::ExternalXtream { url } | StreamRoute::SameHostXtream { url } => {
                fresh(url, dialect)
            }
            StreamRoute::XtreamPlaylist { url } | StreamRoute::Passthrough { url } => url
                .map(|url| fresh(url, dialect))
                .ok_or_else(|| AppError::resolution(NO_VALID_URL))?,
            StreamRoute::MagPortal { stored_url } => {
                self.negotiate_portal_link(playlist, cmd, stored_url).await?
            }
        };

        info!(
            "Resolved channel {} of playlist {} via {}{}",
            channel_id,
            playlist.id,
            classification.matcher,
            if resolved.stale { " (stale)" } else { "" }
        );
        Ok(resolved)
    }

    async fn negotiate_portal_link(
        &self,
        playlist: &Playlist,
        cmd: &str,
        stored_url: Option<String>,
    ) -> AppResult<ResolvedStream> {
        let client = MagClient::from_playlist(playlist, self.http.clone(), self.upstream.clone())?;
        let session = client.handshake().await;
        let mac = Some(client.mac().to_string());

        if let Some(url) = client.create_link_with_fallback(&session, cmd).await {
            debug!(
                "Portal minted link {}",
                UrlUtils::obfuscate_credentials(&url)
            );
            return Ok(ResolvedStream {
                url,
                dialect: Dialect::Mag,
                mac,
                stale: false,
            });
        }

        match stored_url {
            Some(url) => {
                warn!(
                    "Portal could not mint a link for playlist {}, using stored URL {}",
                    playlist.id,
                    UrlUtils::obfuscate_credentials(&url)
                );
                Ok(ResolvedStream {
                    url,
                    dialect: Dialect::Mag,
                    mac,
                    stale: true,
                })
            }
            None => Err(AppError::resolution(NO_VALID_URL)),
        }
    }
}

fn fresh(url: String, dialect: Dialect) -> ResolvedStream {
    ResolvedStream {
        url,
        dialect,
        mac: None,
        stale: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Channel, SourceChannel, SourceType};
    use crate::repositories::InMemoryCatalogStore;
    use chrono::Utc;
    use std::time::Duration;

    async fn resolver_with(playlist: serde_json::Value, channels: Vec<SourceChannel>) -> StreamResolver {
        let playlist: Playlist = serde_json::from_value(playlist).unwrap();
        let id = playlist.id.clone();
        let store = InMemoryCatalogStore::with_playlists([playlist]).await.unwrap();
        let stored = channels
            .into_iter()
            .map(|c| Channel::from_source(&id, c, None, None, Utc::now()))
            .collect();
        store.upsert_channels(&id, stored).await.unwrap();
        StreamResolver::new(
            Arc::new(store),
            StandardHttpClient::with_connection_timeout(Duration::from_secs(1)).unwrap(),
            UpstreamConfig::default(),
        )
    }

    #[tokio::test]
    async fn xtream_playlist_uses_playlist_credentials() {
        let resolver = resolver_with(
            serde_json::json!({
                "id": "x",
                "name": "panel",
                "type": "xtream",
                "sourceUrl": "http://panel.example:8080",
                "xtreamUsername": "alice",
                "xtreamPassword": "pw",
            }),
            vec![],
        )
        .await;

        let resolved = resolver.resolve("x", "991", Some("991")).await.unwrap();
        assert_eq!(resolved.url, "http://panel.example:8080/live/alice/pw/991.ts");
        assert_eq!(resolved.dialect, Dialect::Xtream);
        assert!(!resolved.stale);
    }

    #[tokio::test]
    async fn stored_channel_reference_is_used_when_cmd_absent() {
        let mut channel = SourceChannel::new(SourceType::M3u, "bbc1".into(), "BBC One".into());
        channel.url = "http://cdn.example/play/live.php?mac=m".into();
        let resolver = resolver_with(
            serde_json::json!({
                "id": "m",
                "name": "lists",
                "type": "m3u",
                "sourceUrl": "http://lists.example/tv.m3u",
            }),
            vec![channel],
        )
        .await;

        let resolved = resolver.resolve("m", "bbc1", None).await.unwrap();
        assert_eq!(resolved.url, "http://cdn.example/play/live.php?mac=m&stream=bbc1");
        assert_eq!(resolved.dialect, Dialect::Direct);
    }

    #[tokio::test]
    async fn missing_records_are_not_found() {
        let resolver = resolver_with(
            serde_json::json!({ "id": "m", "name": "lists", "sourceUrl": "http://lists.example/tv.m3u" }),
            vec![],
        )
        .await;
        assert!(matches!(
            resolver.resolve("nope", "1", None).await.unwrap_err(),
            AppError::NotFound { .. }
        ));
        assert!(matches!(
            resolver.resolve("m", "1", None).await.unwrap_err(),
            AppError::NotFound { .. }
        ));
    }

    #[tokio::test]
    async fn unusable_reference_is_a_resolution_error() {
        let resolver = resolver_with(
            serde_json::json!({ "id": "m", "name": "lists", "sourceUrl": "http://lists.example/tv.m3u" }),
            vec![],
        )
        .await;
        let err = resolver.resolve("m", "1", Some("garbage")).await.unwrap_err();
        assert_eq!(err.to_string(), format!("Resolution failed: {NO_VALID_URL}"));
    }

    fn assert_send<T: Send>(_: T) {}

    #[tokio::test]
    async fn resolution_future_is_send() {
        let resolver = resolver_with(
            serde_json::json!({
                "id": "p",
                "name": "portal",
                "type": "mag",
                "sourceUrl": "http://portal.example/c/",
                "macAddress": "00:1A:79:00:00:01",
            }),
            vec![],
        )
        .await;
        assert_send(resolver.resolve("p", "1", Some("ffmpeg http://localhost/ch/1_")));
    }
}
