//! Channel model implementations

use chrono::{DateTime, Utc};

use crate::models::{Channel, ChannelSetting, SourceChannel};

/// Order used for channels without a custom position.
pub const DEFAULT_CHANNEL_ORDER: i32 = 999;

impl Channel {
    /// Build the stored form of a freshly listed channel.
    ///
    /// Overrides come from the playlist's channel settings first and from the
    /// previously stored record second, so a resync never resets them.
    pub fn from_source(
        playlist_id: &str,
        source: SourceChannel,
        setting: Option<&ChannelSetting>,
        previous: Option<&Channel>,
        now: DateTime<Utc>,
    ) -> Self {
        let (is_visible, custom_name, custom_logo, custom_order) = match (setting, previous) {
            (Some(s), _) => (
                s.is_visible,
                s.custom_name.clone(),
                s.custom_logo.clone(),
                s.custom_order,
            ),
            (None, Some(p)) => (
                p.is_visible,
                p.custom_name.clone(),
                p.custom_logo.clone(),
                p.custom_order,
            ),
            (None, None) => (true, None, None, None),
        };

        Self {
            playlist_id: playlist_id.to_string(),
            channel_id: source.channel_id,
            original_name: source.name.clone(),
            name: source.name,
            logo: source.logo,
            group: source.group,
            url: source.url,
            cmd: source.cmd,
            tv_genre_id: source.tv_genre_id,
            tvg_id: source.tvg_id,
            tvg_name: source.tvg_name,
            tvg_logo: source.tvg_logo,
            tvg_shift: source.tvg_shift,
            epg_id: source.epg_id,
            is_hd: source.is_hd,
            is_4k: source.is_4k,
            use_http_tmp_link: source.use_http_tmp_link,
            age_restricted: source.age_restricted,
            source_type: source.source_type,
            is_visible,
            custom_name,
            custom_logo,
            custom_order,
            updated_at: now,
        }
    }

    /// True when nothing but the timestamp differs.
    pub fn same_content(&self, other: &Channel) -> bool {
        let mut other = other.clone();
        other.updated_at = self.updated_at;
        *self == other
    }

    /// The stored cmd, or the URL for dialects that only carry one.
    pub fn stream_reference(&self) -> &str {
        if self.cmd.trim().is_empty() {
            &self.url
        } else {
            &self.cmd
        }
    }

    pub fn display_name(&self) -> &str {
        self.custom_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.name)
    }

    pub fn display_logo(&self) -> &str {
        self.custom_logo
            .as_deref()
            .filter(|l| !l.is_empty())
            .unwrap_or(&self.logo)
    }

    pub fn display_order(&self) -> i32 {
        self.custom_order.unwrap_or(DEFAULT_CHANNEL_ORDER)
    }
}
