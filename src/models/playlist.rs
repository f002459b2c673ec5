//! Playlist model implementations

use crate::errors::{AppError, AppResult, SourceError};
use crate::models::{ChannelSetting, Playlist, PlaylistType, SourceType};
use crate::utils::url::UrlUtils;

impl PlaylistType {
    /// MAG and Stalker are two names for the same portal protocol.
    pub fn is_portal(&self) -> bool {
        matches!(self, PlaylistType::Mag | PlaylistType::Stalker)
    }

    pub fn source_type(&self) -> SourceType {
        match self {
            PlaylistType::Mag | PlaylistType::Stalker => SourceType::Mag,
            PlaylistType::Xtream => SourceType::Xtream,
            PlaylistType::M3u => SourceType::M3u,
        }
    }
}

impl std::str::FromStr for PlaylistType {
    type Err = AppError;

    fn from_str(s: &str) -> AppResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "mag" => Ok(PlaylistType::Mag),
            "stalker" => Ok(PlaylistType::Stalker),
            "xtream" => Ok(PlaylistType::Xtream),
            "m3u" => Ok(PlaylistType::M3u),
            other => Err(AppError::Source(SourceError::UnsupportedType {
                playlist_type: other.to_string(),
            })),
        }
    }
}

impl std::fmt::Display for PlaylistType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaylistType::Mag => write!(f, "mag"),
            PlaylistType::Stalker => write!(f, "stalker"),
            PlaylistType::Xtream => write!(f, "xtream"),
            PlaylistType::M3u => write!(f, "m3u"),
        }
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceType::M3u => write!(f, "m3u"),
            SourceType::Mag => write!(f, "mag"),
            SourceType::Xtream => write!(f, "xtream"),
        }
    }
}

impl Playlist {
    /// Source URL without trailing slashes.
    pub fn base_url(&self) -> String {
        UrlUtils::sanitize(&self.source_url)
    }

    /// Host (without port) of the configured source URL.
    pub fn source_host(&self) -> Option<String> {
        UrlUtils::extract_domain(&self.base_url())
    }

    /// Username and password, only when both are present and non-empty.
    ///
    /// Falls back to the `username`/`password` query of a `get.php` or
    /// `player_api.php` source URL.
    pub fn xtream_credentials(&self) -> Option<(String, String)> {
        match (self.xtream_username.as_deref(), self.xtream_password.as_deref()) {
            (Some(user), Some(pass)) if !user.is_empty() && !pass.is_empty() => {
                Some((user.to_string(), pass.to_string()))
            }
            _ => {
                let url = url::Url::parse(&self.base_url()).ok()?;
                let find = |key: &str| {
                    url.query_pairs()
                        .find(|(k, v)| k == key && !v.is_empty())
                        .map(|(_, v)| v.into_owned())
                };
                Some((find("username")?, find("password")?))
            }
        }
    }

    /// Panel root for Xtream API and stream URLs.
    ///
    /// A source URL pointing at a `.php` endpoint is reduced to its origin.
    pub fn xtream_base_url(&self) -> String {
        let base = self.base_url();
        match url::Url::parse(&base) {
            Ok(parsed) if parsed.path().ends_with(".php") => {
                UrlUtils::origin(&base).unwrap_or(base)
            }
            _ => base,
        }
    }

    pub fn mac(&self) -> Option<&str> {
        self.mac_address
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
    }

    /// Best-effort type detection for playlists stored without a type.
    ///
    /// Xtream endpoints in the source URL win over a MAC address.
    pub fn detect_type(&self) -> Option<PlaylistType> {
        if self.source_url.contains("get.php") || self.source_url.contains("player_api.php") {
            Some(PlaylistType::Xtream)
        } else if self.mac().is_some() {
            Some(PlaylistType::Mag)
        } else {
            None
        }
    }

    /// Stored type, falling back to detection.
    pub fn effective_type(&self) -> AppResult<PlaylistType> {
        self.playlist_type
            .or_else(|| self.detect_type())
            .ok_or_else(|| {
                AppError::Source(SourceError::UnsupportedType {
                    playlist_type: "unset".to_string(),
                })
            })
    }

    /// Check the credential invariants for the given dialect.
    pub fn validate_for(&self, playlist_type: PlaylistType) -> AppResult<()> {
        if self.source_url.trim().is_empty() {
            return Err(AppError::validation(format!(
                "Playlist '{}' has no source URL",
                self.name
            )));
        }
        match playlist_type {
            PlaylistType::Xtream if self.xtream_credentials().is_none() => {
                Err(AppError::validation(format!(
                    "Xtream playlist '{}' requires username and password",
                    self.name
                )))
            }
            PlaylistType::Mag | PlaylistType::Stalker if self.mac().is_none() => {
                Err(AppError::validation(format!(
                    "MAG playlist '{}' requires a MAC address",
                    self.name
                )))
            }
            _ => Ok(()),
        }
    }

    pub fn setting_for(&self, channel_id: &str) -> Option<&ChannelSetting> {
        self.channel_settings
            .iter()
            .find(|s| s.channel_id == channel_id)
    }
}
