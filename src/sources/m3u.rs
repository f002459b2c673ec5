//! M3U playlist client
//!
//! Downloads an extended M3U playlist and turns each `#EXTINF` entry into a
//! channel. The download is the only failure point; parsing never fails.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::header::HeaderMap;
use serde_json::{Value, json};
use tracing::{debug, info};

use super::traits::{CatalogSnapshot, CatalogSource};
use crate::config::UpstreamConfig;
use crate::errors::{AppResult, SourceResult};
use crate::models::{DEFAULT_GROUP, Playlist, SourceChannel, SourceType};
use crate::utils::{StandardHttpClient, UrlUtils};

static DURATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(-?\d+)").expect("literal pattern"));

static ATTRIBUTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"([\w-]+)="([^"]*)""#).expect("literal pattern"));

/// One parsed `#EXTINF` entry and the URL line that follows it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct M3uEntry {
    pub duration: i64,
    pub name: String,
    pub tvg_id: String,
    pub tvg_name: String,
    pub tvg_logo: String,
    pub tvg_shift: String,
    pub group: String,
    pub url: String,
}

impl M3uEntry {
    fn from_extinf(extinf: &str) -> Self {
        let duration = DURATION
            .captures(extinf)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0);

        let mut entry = Self {
            duration,
            name: extinf
                .rfind(',')
                .map(|idx| extinf[idx + 1..].trim().to_string())
                .unwrap_or_else(|| "Unknown".to_string()),
            group: DEFAULT_GROUP.to_string(),
            ..Default::default()
        };

        // Only the part before the display name carries attributes
        let attributes = extinf.rfind(',').map_or(extinf, |idx| &extinf[..idx]);
        for captures in ATTRIBUTE.captures_iter(attributes) {
            let value = captures[2].to_string();
            match &captures[1] {
                "tvg-id" => entry.tvg_id = value,
                "tvg-name" => entry.tvg_name = value,
                "tvg-logo" => entry.tvg_logo = value,
                "tvg-shift" => entry.tvg_shift = value,
                "group-title" if !value.is_empty() => entry.group = value,
                _ => {}
            }
        }
        entry
    }

    fn into_channel(self, index: usize) -> SourceChannel {
        let channel_id = [&self.tvg_id, &self.name]
            .into_iter()
            .find(|v| !v.trim().is_empty())
            .cloned()
            .unwrap_or_else(|| format!("m3u_{index}"));
        let mut channel = SourceChannel::new(SourceType::M3u, channel_id, self.name);
        channel.logo = self.tvg_logo.clone();
        channel.tvg_logo = self.tvg_logo;
        channel.tvg_id = self.tvg_id;
        channel.tvg_name = self.tvg_name;
        channel.tvg_shift = self.tvg_shift;
        channel.group = self.group;
        channel.url = self.url;
        channel
    }
}

/// Parse playlist text into entries.
///
/// Each `#EXTINF:` line is paired with the next non-blank line that is not a
/// directive; an entry without one keeps an empty URL.
pub fn parse_entries(content: &str) -> Vec<M3uEntry> {
    let mut entries = Vec::new();
    let mut lines = content.lines().map(str::trim).peekable();

    while let Some(line) = lines.next() {
        let Some(extinf) = line.strip_prefix("#EXTINF:") else {
            continue;
        };
        let mut entry = M3uEntry::from_extinf(extinf);
        while let Some(next) = lines.peek() {
            if next.starts_with("#EXTINF:") {
                break;
            }
            let next = lines.next().unwrap_or_default();
            if !next.is_empty() && !next.starts_with('#') {
                entry.url = next.to_string();
                break;
            }
        }
        entries.push(entry);
    }
    entries
}

/// Parse playlist text into channels.
pub fn parse_m3u(content: &str) -> Vec<SourceChannel> {
    parse_entries(content)
        .into_iter()
        .enumerate()
        .map(|(index, entry)| entry.into_channel(index))
        .collect()
}

/// Client for a plain M3U playlist URL.
pub struct M3uClient {
    url: String,
    http: StandardHttpClient,
    upstream: UpstreamConfig,
}

impl M3uClient {
    pub fn new(url: &str, http: StandardHttpClient, upstream: UpstreamConfig) -> Self {
        Self {
            url: UrlUtils::normalize_scheme(url),
            http,
            upstream,
        }
    }

    pub fn from_playlist(
        playlist: &Playlist,
        http: StandardHttpClient,
        upstream: UpstreamConfig,
    ) -> AppResult<Self> {
        playlist.validate_for(crate::models::PlaylistType::M3u)?;
        Ok(Self::new(&playlist.source_url, http, upstream))
    }

    /// Download and parse the playlist. Network failures are fatal.
    pub async fn fetch(&self) -> SourceResult<Vec<SourceChannel>> {
        let content = self
            .http
            .get_text(&self.url, &[], HeaderMap::new(), self.upstream.listing_timeout)
            .await?;
        let channels = parse_m3u(&content);
        info!(
            "Parsed {} channels from {}",
            channels.len(),
            UrlUtils::obfuscate_credentials(&self.url)
        );
        if channels.is_empty() {
            debug!("Playlist body had no #EXTINF entries");
        }
        Ok(channels)
    }
}

#[async_trait]
impl CatalogSource for M3uClient {
    fn source_type(&self) -> SourceType {
        SourceType::M3u
    }

    async fn fetch_catalog(&self) -> SourceResult<CatalogSnapshot> {
        Ok(CatalogSnapshot {
            channels: self.fetch().await?,
            sync_data: Value::Null,
        })
    }

    async fn test_connection(&self) -> SourceResult<Value> {
        let channels = self.fetch().await?;
        Ok(json!({ "channelsCount": channels.len() }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"#EXTM3U
#EXTINF:-1 tvg-id="bbc1" tvg-name="BBC One" tvg-logo="http://x/logo.png" group-title="News",BBC One
http://stream.example/bbc1.m3u8

#EXTINF:0 tvg-shift="+1",Shifted, Again
#EXTVLCOPT:http-user-agent=VLC

http://stream.example/shift.ts
#EXTINF:-1,
#EXTINF:-1 tvg-id="" group-title="",Trailing
"#;

    #[test]
    fn parses_bbc_sample() {
        let channels = parse_m3u(SAMPLE);
        let bbc = &channels[0];
        assert_eq!(bbc.channel_id, "bbc1");
        assert_eq!(bbc.name, "BBC One");
        assert_eq!(bbc.tvg_logo, "http://x/logo.png");
        assert_eq!(bbc.logo, "http://x/logo.png");
        assert_eq!(bbc.group, "News");
        assert_eq!(bbc.url, "http://stream.example/bbc1.m3u8");
        assert_eq!(bbc.source_type, SourceType::M3u);
    }

    #[test]
    fn pairs_with_next_url_line_and_falls_back() {
        let entries = parse_entries(SAMPLE);
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[0].duration, -1);

        assert_eq!(entries[1].name, "Again");
        assert_eq!(entries[1].tvg_shift, "+1");
        assert_eq!(entries[1].url, "http://stream.example/shift.ts");

        assert_eq!(entries[2].url, "");
        assert_eq!(entries[3].url, "");

        let channels = parse_m3u(SAMPLE);
        assert_eq!(channels[1].channel_id, "Again");
        assert_eq!(channels[1].group, DEFAULT_GROUP);
        assert_eq!(channels[2].channel_id, "m3u_2");
        assert_eq!(channels[3].channel_id, "Trailing");
        assert_eq!(channels[3].group, DEFAULT_GROUP);
    }

    #[test]
    fn missing_comma_names_unknown() {
        let entries = parse_entries("#EXTINF:-1 tvg-id=\"x\"\nhttp://a/b");
        assert_eq!(entries[0].name, "Unknown");
        assert_eq!(entries[0].tvg_id, "x");
    }
}
