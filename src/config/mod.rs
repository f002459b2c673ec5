use std::path::Path;
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use tracing::info;

pub mod defaults;
pub mod duration_serde;

use defaults::*;
use duration_serde::duration;

use crate::errors::{AppError, AppResult};
use crate::models::{ChannelSetting, Playlist, PlaylistStatus, PlaylistType};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    /// Playlists loaded into the catalog store at startup
    #[serde(default)]
    pub playlists: Vec<PlaylistSeed>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Bearer token required on `/api` routes when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
}

/// Timeouts and device emulation for every outbound call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(with = "duration", default = "default_connect_timeout")]
    pub connect_timeout: Duration,
    /// Portal handshake and API path probing
    #[serde(with = "duration", default = "default_handshake_timeout")]
    pub handshake_timeout: Duration,
    /// Account info, genres, Xtream authentication, secondary listing variants
    #[serde(with = "duration", default = "default_metadata_timeout")]
    pub metadata_timeout: Duration,
    #[serde(with = "duration", default = "default_link_timeout")]
    pub link_timeout: Duration,
    #[serde(with = "duration", default = "default_profile_timeout")]
    pub profile_timeout: Duration,
    #[serde(with = "duration", default = "default_genre_listing_timeout")]
    pub genre_listing_timeout: Duration,
    /// One-shot channel listings and M3U downloads
    #[serde(with = "duration", default = "default_listing_timeout")]
    pub listing_timeout: Duration,
    /// Time allowed for a media upstream to send response headers
    #[serde(with = "duration", default = "default_media_timeout")]
    pub media_timeout: Duration,
    #[serde(default = "default_mac_address")]
    pub default_mac: String,
    #[serde(default = "default_genre_batch_size")]
    pub genre_batch_size: usize,
    #[serde(default = "default_xtream_user_agents")]
    pub xtream_user_agents: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Cron expression (seconds field included) for periodic catalog sync
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cron: Option<String>,
    #[serde(default = "default_sync_on_startup")]
    pub run_on_startup: bool,
}

/// Playlist definition in the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistSeed {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(rename = "type", default)]
    pub playlist_type: Option<PlaylistType>,
    pub source_url: String,
    #[serde(default)]
    pub mac_address: Option<String>,
    #[serde(default)]
    pub xtream_username: Option<String>,
    #[serde(default)]
    pub xtream_password: Option<String>,
    #[serde(default)]
    pub channel_settings: Vec<ChannelSetting>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl PlaylistSeed {
    pub fn into_playlist(self) -> Playlist {
        Playlist {
            id: self
                .id
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            name: self.name,
            playlist_type: self.playlist_type,
            source_url: self.source_url,
            mac_address: self.mac_address,
            xtream_username: self.xtream_username,
            xtream_password: self.xtream_password,
            channel_settings: self.channel_settings,
            last_sync: None,
            channel_count: 0,
            status: PlaylistStatus::Inactive,
            error: None,
            sync_data: serde_json::Value::Null,
            is_active: self.is_active,
        }
    }
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS)
}

fn default_handshake_timeout() -> Duration {
    Duration::from_secs(DEFAULT_HANDSHAKE_TIMEOUT_SECS)
}

fn default_metadata_timeout() -> Duration {
    Duration::from_secs(DEFAULT_METADATA_TIMEOUT_SECS)
}

fn default_link_timeout() -> Duration {
    Duration::from_secs(DEFAULT_LINK_TIMEOUT_SECS)
}

fn default_profile_timeout() -> Duration {
    Duration::from_secs(DEFAULT_PROFILE_TIMEOUT_SECS)
}

fn default_genre_listing_timeout() -> Duration {
    Duration::from_secs(DEFAULT_GENRE_LISTING_TIMEOUT_SECS)
}

fn default_listing_timeout() -> Duration {
    Duration::from_secs(DEFAULT_LISTING_TIMEOUT_SECS)
}

fn default_media_timeout() -> Duration {
    Duration::from_secs(DEFAULT_MEDIA_TIMEOUT_SECS)
}

fn default_mac_address() -> String {
    DEFAULT_MAC_ADDRESS.to_string()
}

fn default_genre_batch_size() -> usize {
    DEFAULT_GENRE_BATCH_SIZE
}

fn default_xtream_user_agents() -> Vec<String> {
    DEFAULT_XTREAM_USER_AGENTS
        .iter()
        .map(|ua| ua.to_string())
        .collect()
}

fn default_sync_on_startup() -> bool {
    DEFAULT_SYNC_ON_STARTUP
}

fn default_true() -> bool {
    true
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            api_token: None,
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            connect_timeout: default_connect_timeout(),
            handshake_timeout: default_handshake_timeout(),
            metadata_timeout: default_metadata_timeout(),
            link_timeout: default_link_timeout(),
            profile_timeout: default_profile_timeout(),
            genre_listing_timeout: default_genre_listing_timeout(),
            listing_timeout: default_listing_timeout(),
            media_timeout: default_media_timeout(),
            default_mac: default_mac_address(),
            genre_batch_size: default_genre_batch_size(),
            xtream_user_agents: default_xtream_user_agents(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            cron: None,
            run_on_startup: default_sync_on_startup(),
        }
    }
}

impl Config {
    /// Load defaults, then the TOML file (if present), then `PORTAL_PROXY_*` variables.
    ///
    /// Nested keys use a double underscore, e.g. `PORTAL_PROXY_WEB__PORT=9000`.
    pub fn load_from_file(config_file: &str) -> AppResult<Self> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if Path::new(config_file).exists() {
            info!("Loading configuration from: {}", config_file);
            figment = figment.merge(Toml::file(config_file));
        } else {
            info!("Config file {} not found, using defaults", config_file);
        }
        let config: Config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(|e| AppError::configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.upstream.genre_batch_size == 0 {
            return Err(AppError::configuration(
                "upstream.genre_batch_size must be at least 1",
            ));
        }
        if self.upstream.xtream_user_agents.is_empty() {
            return Err(AppError::configuration(
                "upstream.xtream_user_agents must not be empty",
            ));
        }
        if let Some(expr) = &self.sync.cron {
            expr.parse::<cron::Schedule>().map_err(|e| {
                AppError::configuration(format!("Invalid sync cron expression '{expr}': {e}"))
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    fn test_default_upstream_timeouts() {
        let upstream = UpstreamConfig::default();
        assert_eq!(upstream.handshake_timeout, Duration::from_secs(8));
        assert_eq!(upstream.listing_timeout, Duration::from_secs(30));
        assert_eq!(upstream.genre_batch_size, 5);
        assert_eq!(upstream.xtream_user_agents[0], "VLC/3.0.18 LibVLC/3.0.18");
    }

    #[test]
    #[serial]
    fn test_load_from_file_with_playlists() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[web]
port = 9100

[upstream]
handshake_timeout = "5s"

[sync]
cron = "0 0 */6 * * *"

[[playlists]]
id = "portal"
name = "Portal"
type = "stalker"
source_url = "http://portal.example/c/"
mac_address = "00:1A:79:00:00:01"
"#
        )
        .unwrap();

        let config = Config::load_from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.web.port, 9100);
        assert_eq!(config.web.host, DEFAULT_HOST);
        assert_eq!(config.upstream.handshake_timeout, Duration::from_secs(5));
        assert_eq!(config.upstream.link_timeout, Duration::from_secs(10));

        let playlist = config.playlists[0].clone().into_playlist();
        assert_eq!(playlist.id, "portal");
        assert_eq!(playlist.playlist_type, Some(PlaylistType::Stalker));
        assert!(playlist.validate_for(PlaylistType::Stalker).is_ok());
    }

    #[test]
    #[serial]
    fn test_rejects_invalid_cron() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[sync]\ncron = \"every day\"").unwrap();
        let err = Config::load_from_file(file.path().to_str().unwrap()).unwrap_err();
        assert!(matches!(err, AppError::Configuration { .. }));
    }

    #[test]
    fn test_seed_without_id_gets_uuid() {
        let seed: PlaylistSeed = toml::from_str(
            r#"
name = "Lists"
source_url = "http://lists.example/tv.m3u"
"#,
        )
        .unwrap();
        let playlist = seed.into_playlist();
        assert!(uuid::Uuid::parse_str(&playlist.id).is_ok());
        assert!(playlist.is_active);
    }
}
