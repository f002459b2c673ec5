use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod channel;
pub mod playlist;

/// Upstream protocol family a playlist is served by.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PlaylistType {
    Mag,
    Stalker,
    Xtream,
    M3u,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlaylistStatus {
    Active,
    #[default]
    Inactive,
    Error,
}

/// Origin dialect recorded on every stored channel.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    M3u,
    Mag,
    Xtream,
}

/// Per-channel override kept on the playlist record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChannelSetting {
    pub channel_id: String,
    #[serde(default = "default_visible")]
    pub is_visible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_logo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_order: Option<i32>,
}

fn default_visible() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    pub id: String,
    pub name: String,
    /// Unset means "detect from the source URL and credentials at sync time".
    #[serde(rename = "type", default)]
    pub playlist_type: Option<PlaylistType>,
    pub source_url: String,
    #[serde(default)]
    pub mac_address: Option<String>,
    #[serde(default)]
    pub xtream_username: Option<String>,
    #[serde(default, skip_serializing)]
    pub xtream_password: Option<String>,
    #[serde(default)]
    pub channel_settings: Vec<ChannelSetting>,
    #[serde(default)]
    pub last_sync: Option<DateTime<Utc>>,
    #[serde(default)]
    pub channel_count: usize,
    #[serde(default)]
    pub status: PlaylistStatus,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub sync_data: serde_json::Value,
    #[serde(default = "default_visible")]
    pub is_active: bool,
}

/// A stored channel. Identity is `(playlist_id, channel_id)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub playlist_id: String,
    pub channel_id: String,
    pub name: String,
    pub original_name: String,
    pub logo: String,
    pub group: String,
    pub url: String,
    pub cmd: String,
    pub tv_genre_id: Option<String>,
    pub tvg_id: String,
    pub tvg_name: String,
    pub tvg_logo: String,
    pub tvg_shift: String,
    pub epg_id: String,
    pub is_hd: bool,
    pub is_4k: bool,
    pub use_http_tmp_link: bool,
    pub age_restricted: bool,
    pub source_type: SourceType,
    pub is_visible: bool,
    pub custom_name: Option<String>,
    pub custom_logo: Option<String>,
    pub custom_order: Option<i32>,
    pub updated_at: DateTime<Utc>,
}

/// Channel as produced by a dialect client, before overrides are merged.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SourceChannel {
    pub channel_id: String,
    pub name: String,
    pub logo: String,
    pub group: String,
    pub url: String,
    pub cmd: String,
    pub tv_genre_id: Option<String>,
    pub tvg_id: String,
    pub tvg_name: String,
    pub tvg_logo: String,
    pub tvg_shift: String,
    pub epg_id: String,
    pub is_hd: bool,
    pub is_4k: bool,
    pub use_http_tmp_link: bool,
    pub age_restricted: bool,
    pub source_type: SourceType,
}

impl SourceChannel {
    /// Empty record for the given dialect; callers fill in what they know.
    pub fn new(source_type: SourceType, channel_id: String, name: String) -> Self {
        Self {
            channel_id,
            name,
            logo: String::new(),
            group: DEFAULT_GROUP.to_string(),
            url: String::new(),
            cmd: String::new(),
            tv_genre_id: None,
            tvg_id: String::new(),
            tvg_name: String::new(),
            tvg_logo: String::new(),
            tvg_shift: String::new(),
            epg_id: String::new(),
            is_hd: false,
            is_4k: false,
            use_http_tmp_link: false,
            age_restricted: false,
            source_type,
        }
    }
}

/// Group assigned to channels whose upstream gives none.
pub const DEFAULT_GROUP: &str = "Uncategorized";

/// Fields written back to a playlist after a sync attempt.
#[derive(Debug, Clone, Default)]
pub struct PlaylistSyncUpdate {
    pub status: PlaylistStatus,
    pub last_sync: Option<DateTime<Utc>>,
    pub channel_count: Option<usize>,
    pub error: Option<String>,
    pub sync_data: Option<serde_json::Value>,
    pub detected_type: Option<PlaylistType>,
}

/// Dialect a resolved stream URL belongs to; selects the upstream headers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Mag,
    Xtream,
    Direct,
}

/// Output of one stream resolution. Consumed by the proxy and dropped.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedStream {
    pub url: String,
    pub dialect: Dialect,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,
    /// Set when a fresh link could not be minted and the stored URL was returned.
    pub stale: bool,
}
