//! Source client factory
//!
//! Builds a fresh dialect client for every sync or connection test. Clients
//! hold no state across calls, so nothing learned by one request (API path,
//! token, credential validity) leaks into another.

use serde::Deserialize;

use super::m3u::M3uClient;
use super::mag::MagClient;
use super::traits::CatalogSource;
use super::xtream::XtreamClient;
use crate::config::UpstreamConfig;
use crate::errors::AppResult;
use crate::models::{Playlist, PlaylistStatus, PlaylistType};
use crate::utils::StandardHttpClient;

/// Ad-hoc connection parameters for testing a source before it is saved.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionParams {
    #[serde(rename = "type")]
    pub playlist_type: PlaylistType,
    pub source_url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub mac_address: Option<String>,
}

impl ConnectionParams {
    /// Unsaved playlist carrying these parameters.
    pub fn to_playlist(&self) -> Playlist {
        Playlist {
            id: "connection-test".to_string(),
            name: "connection test".to_string(),
            playlist_type: Some(self.playlist_type),
            source_url: self.source_url.clone(),
            mac_address: self.mac_address.clone(),
            xtream_username: self.username.clone(),
            xtream_password: self.password.clone(),
            channel_settings: Vec::new(),
            last_sync: None,
            channel_count: 0,
            status: PlaylistStatus::Inactive,
            error: None,
            sync_data: serde_json::Value::Null,
            is_active: true,
        }
    }
}

pub struct SourceClientFactory;

impl SourceClientFactory {
    /// Create the client for `playlist_type`, validating the playlist first.
    pub fn create(
        playlist: &Playlist,
        playlist_type: PlaylistType,
        http: &StandardHttpClient,
        upstream: &UpstreamConfig,
    ) -> AppResult<Box<dyn CatalogSource>> {
        match playlist_type {
            PlaylistType::Mag | PlaylistType::Stalker => Ok(Box::new(MagClient::from_playlist(
                playlist,
                http.clone(),
                upstream.clone(),
            )?)),
            PlaylistType::Xtream => Ok(Box::new(XtreamClient::from_playlist(
                playlist,
                http.clone(),
                upstream.clone(),
            )?)),
            PlaylistType::M3u => Ok(Box::new(M3uClient::from_playlist(
                playlist,
                http.clone(),
                upstream.clone(),
            )?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AppError;
    use crate::models::SourceType;
    use std::time::Duration;

    fn http() -> StandardHttpClient {
        StandardHttpClient::with_connection_timeout(Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn creates_client_matching_type() {
        let params: ConnectionParams = serde_json::from_value(serde_json::json!({
            "type": "stalker",
            "sourceUrl": "http://portal.example/c/",
            "macAddress": "00:1A:79:00:00:01",
        }))
        .unwrap();
        let playlist = params.to_playlist();
        let playlist_type = playlist.effective_type().unwrap();
        let client =
            SourceClientFactory::create(&playlist, playlist_type, &http(), &UpstreamConfig::default())
                .unwrap();
        assert_eq!(client.source_type(), SourceType::Mag);
    }

    #[test]
    fn invariant_violations_are_validation_errors() {
        let params: ConnectionParams = serde_json::from_value(serde_json::json!({
            "type": "xtream",
            "sourceUrl": "http://panel.example",
            "username": "alice",
        }))
        .unwrap();
        let err = SourceClientFactory::create(
            &params.to_playlist(),
            PlaylistType::Xtream,
            &http(),
            &UpstreamConfig::default(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, AppError::Validation { .. }));
    }
}
