//! MAG/Stalker portal client
//!
//! Emulates a MAG250 set-top box against Stalker-style middleware. Every
//! call is made within a [`MagSession`] obtained from [`MagClient::handshake`];
//! sessions are returned to the caller and never cached on the client, so
//! concurrent resolutions against the same portal cannot interfere.
//!
//! Portals vary widely in which API path and listing actions they support.
//! Path discovery, the channel-listing cascade and `create_link` candidates
//! all use [`first_successful`] over ordered candidate tables.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use futures::future::join_all;
use regex::Regex;
use reqwest::header::HeaderMap;
use serde::Serialize;
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::portal_response::{PortalResponse, decode_portal_response};
use super::traits::{CatalogSnapshot, CatalogSource, Outcome};
use crate::config::UpstreamConfig;
use crate::errors::{AppResult, SourceError, SourceResult};
use crate::models::{DEFAULT_GROUP, Playlist, PlaylistType, SourceChannel, SourceType};
use crate::proxy::upstream_headers::mag_device_headers;
use crate::streaming::classification::extract_url;
use crate::utils::{StandardHttpClient, UrlUtils, first_successful};

/// API paths probed during the handshake, most common first.
pub const API_PATHS: &[&str] = &[
    "/server/load.php",
    "/c/server/load.php",
    "/stalker_portal/server/load.php",
    "/portal/server/load.php",
];

const DEFAULT_API_PATH: &str = "/server/load.php";

// Fixed MAG250 device identity sent with get_profile
const DEVICE_SERIAL: &str = "313356B172963";
const DEVICE_HW_VERSION_2: &str = "313356b17296332b483ccaa49f3eb8f7";
const DEVICE_MODEL: &str = "MAG250";
const DEVICE_IMAGE_VERSION: &str = "218";
const DEVICE_H2_VERSION: &str = "1.7-BD-00";
const DEVICE_API_SIGNATURE: &str = "263";
const DEVICE_VERSION_STRING: &str = "ImageDescription: 0.2.18-r14-pub-250; ImageDate: Fri Jan 15 15:20:44 EET 2016; PORTAL version: 5.1.0; API Version: JS API version: 328; STB API version: 134; Player Engine version: 0x566";

type Params = &'static [(&'static str, &'static str)];

/// Listings that usually return the whole catalog in one answer.
const ONE_SHOT_LISTINGS: &[Params] = &[
    &[("type", "itv"), ("action", "get_all_channels"), ("all", "1")],
    &[("type", "itv"), ("action", "get_ordered_list")],
    &[("type", "itv"), ("action", "get_all_channels")],
    &[("type", "itv"), ("action", "get_all_items")],
];

/// Vendor variants tried when no one-shot listing answered.
const VARIANT_LISTINGS: &[Params] = &[
    &[("type", "itv"), ("action", "get_channels")],
    &[
        ("type", "itv"),
        ("action", "get_all_channels"),
        ("force_ch_link_check", "1"),
    ],
    &[("type", "itv"), ("action", "get_all_channels"), ("genre", "1")],
    &[("type", "vod"), ("action", "get_ordered_list")],
];

static STREAM_PARAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"stream=(\d+)").expect("literal pattern"));

/// API path and token negotiated by one handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MagSession {
    pub api_path: String,
    pub token: Option<String>,
}

impl MagSession {
    /// Session used when no path produced a token.
    pub fn tokenless() -> Self {
        Self {
            api_path: DEFAULT_API_PATH.to_string(),
            token: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Genre {
    pub id: String,
    pub title: String,
}

/// Stalker portal client for one playlist.
pub struct MagClient {
    base_url: String,
    mac: String,
    http: StandardHttpClient,
    upstream: UpstreamConfig,
}

impl MagClient {
    pub fn new(
        base_url: &str,
        mac: &str,
        http: StandardHttpClient,
        upstream: UpstreamConfig,
    ) -> Self {
        Self {
            base_url: UrlUtils::sanitize(base_url),
            mac: mac.trim().to_string(),
            http,
            upstream,
        }
    }

    /// Build a client after checking the portal invariants of the playlist.
    pub fn from_playlist(
        playlist: &Playlist,
        http: StandardHttpClient,
        upstream: UpstreamConfig,
    ) -> AppResult<Self> {
        playlist.validate_for(PlaylistType::Mag)?;
        let mac = playlist.mac().unwrap_or_default();
        Ok(Self::new(&playlist.base_url(), mac, http, upstream))
    }

    pub fn mac(&self) -> &str {
        &self.mac
    }

    fn headers(&self, token: Option<&str>) -> HeaderMap {
        mag_device_headers(&self.mac, token, &self.base_url)
    }

    /// One portal API call within a session.
    async fn call(
        &self,
        session: &MagSession,
        params: &[(&str, &str)],
        timeout: Duration,
    ) -> SourceResult<PortalResponse> {
        let url = format!("{}{}", self.base_url, session.api_path);
        let mut query: Vec<(&str, &str)> = params.to_vec();
        query.push(("JsHttpRequest", "1-xml"));
        if let Some(token) = session.token.as_deref() {
            query.push(("token", token));
        }
        let text = self
            .http
            .get_text(&url, &query, self.headers(session.token.as_deref()), timeout)
            .await?;
        Ok(decode_portal_response(&text))
    }

    async fn probe_path(&self, path: &str) -> Option<MagSession> {
        let url = format!("{}{}", self.base_url, path);
        let query = [
            ("type", "stb"),
            ("action", "handshake"),
            ("token", ""),
            ("JsHttpRequest", "1-xml"),
        ];
        match self
            .http
            .get_text(&url, &query, self.headers(None), self.upstream.handshake_timeout)
            .await
        {
            Ok(text) => decode_portal_response(&text).token().map(|token| MagSession {
                api_path: path.to_string(),
                token: Some(token),
            }),
            Err(e) => {
                debug!("Handshake on {} failed: {}", path, e);
                None
            }
        }
    }

    /// Discover the API path and obtain a token.
    ///
    /// Never fails: when no path yields a token the session falls back to the
    /// default path without one, and later calls are attempted anyway.
    pub async fn handshake(&self) -> MagSession {
        match first_successful(API_PATHS.to_vec(), |path| self.probe_path(path)).await {
            Some(session) => {
                debug!(
                    "Portal handshake succeeded on {} for {}",
                    session.api_path,
                    UrlUtils::obfuscate_credentials(&self.base_url)
                );
                session
            }
            None => {
                warn!(
                    "No handshake path returned a token for {}, continuing without token",
                    UrlUtils::obfuscate_credentials(&self.base_url)
                );
                MagSession::tokenless()
            }
        }
    }

    pub async fn get_account_info(&self, session: &MagSession) -> Outcome<Value> {
        let offline = json!({ "status": "offline" });
        match self
            .call(
                session,
                &[("type", "account_info"), ("action", "get_main_info")],
                self.upstream.metadata_timeout,
            )
            .await
        {
            Ok(response) if response.is_opaque() => {
                Outcome::degraded(offline, "account info response was not JSON")
            }
            Ok(response) => Outcome::Complete(
                response
                    .js()
                    .cloned()
                    .unwrap_or_else(|| json!({ "status": "ok" })),
            ),
            Err(e) => Outcome::degraded(offline, format!("account info unavailable: {e}")),
        }
    }

    pub async fn get_profile(&self, session: &MagSession) -> Outcome<Option<Value>> {
        let random: [u8; 16] = rand::random();
        let metrics = json!({
            "mac": self.mac,
            "sn": DEVICE_SERIAL,
            "model": DEVICE_MODEL,
            "type": "STB",
            "uid": "",
            "random": hex::encode(random),
        })
        .to_string();
        let timestamp = chrono::Utc::now().timestamp().to_string();

        let params = [
            ("type", "stb"),
            ("action", "get_profile"),
            ("hd", "1"),
            ("ver", DEVICE_VERSION_STRING),
            ("num_banks", "2"),
            ("sn", DEVICE_SERIAL),
            ("stb_type", DEVICE_MODEL),
            ("image_version", DEVICE_IMAGE_VERSION),
            ("video_out", "hdmi"),
            ("device_id", ""),
            ("device_id2", ""),
            ("signature", ""),
            ("auth_second_step", "1"),
            ("h2_version", DEVICE_H2_VERSION),
            ("not_valid_token", "0"),
            ("client_type", "STB"),
            ("hw_version_2", DEVICE_HW_VERSION_2),
            ("timestamp", timestamp.as_str()),
            ("api_signature", DEVICE_API_SIGNATURE),
            ("metrics", metrics.as_str()),
        ];

        match self
            .call(session, &params, self.upstream.profile_timeout)
            .await
        {
            Ok(response) if !response.is_opaque() => Outcome::Complete(response.js().cloned()),
            Ok(_) => Outcome::degraded(None, "profile response was not JSON"),
            Err(e) => Outcome::degraded(None, format!("profile unavailable: {e}")),
        }
    }

    pub async fn get_genres(&self, session: &MagSession) -> Outcome<Vec<Genre>> {
        let response = match self
            .call(
                session,
                &[("type", "itv"), ("action", "get_genres")],
                self.upstream.metadata_timeout,
            )
            .await
        {
            Ok(response) => response,
            Err(e) => return Outcome::degraded(Vec::new(), format!("genres unavailable: {e}")),
        };

        let Some(Value::Array(items)) = response.js() else {
            return Outcome::degraded(Vec::new(), "genre listing was not an array");
        };

        let genres: Vec<Genre> = items
            .iter()
            .filter_map(|item| {
                Some(Genre {
                    id: field_string(item, &["id"])?,
                    title: field_string(item, &["title", "name"]).unwrap_or_default(),
                })
            })
            .collect();
        debug!("Portal returned {} genres", genres.len());
        Outcome::Complete(genres)
    }

    /// Mint a playable link for `cmd`. Returns the portal's `js.cmd` or `js.url`.
    pub async fn create_link(&self, session: &MagSession, cmd: &str) -> Option<String> {
        let params = [
            ("type", "itv"),
            ("action", "create_link"),
            ("cmd", cmd),
            ("series", "0"),
            ("forced_storage", "0"),
            ("disable_ad", "0"),
        ];
        match self.call(session, &params, self.upstream.link_timeout).await {
            Ok(response) => response
                .text("js.cmd")
                .or_else(|| response.text("js.url")),
            Err(e) => {
                warn!("create_link failed: {}", e);
                None
            }
        }
    }

    /// Short `live.php` form of a cmd that carries `stream=<id>`.
    pub fn short_cmd(&self, cmd: &str) -> Option<String> {
        let stream_id = STREAM_PARAM.captures(cmd)?.get(1)?.as_str();
        let host = extract_url(cmd)
            .and_then(|url| UrlUtils::host_with_port(&url))
            .or_else(|| UrlUtils::host_with_port(&self.base_url))?;
        Some(format!(
            "ffmpeg http://{}/play/live.php?mac={}&stream={}&extension=ts",
            host, self.mac, stream_id
        ))
    }

    /// `create_link` on the stored cmd, then on its short form.
    ///
    /// Returns the playable URL extracted from the first fresh cmd that has one.
    pub async fn create_link_with_fallback(
        &self,
        session: &MagSession,
        cmd: &str,
    ) -> Option<String> {
        let mut candidates = vec![cmd.to_string()];
        if let Some(short) = self.short_cmd(cmd) {
            candidates.push(short);
        }
        first_successful(candidates, |candidate| async move {
            let fresh = self.create_link(session, &candidate).await?;
            extract_url(&fresh)
        })
        .await
    }

    async fn try_listing(
        &self,
        session: &MagSession,
        params: Params,
        timeout: Duration,
        extract: fn(&Value) -> Vec<Value>,
    ) -> Option<Vec<Value>> {
        let response = match self.call(session, params, timeout).await {
            Ok(response) => response,
            Err(e) => {
                debug!("Listing {:?} failed: {}", params, e);
                return None;
            }
        };
        let channels = response.js().map(extract).unwrap_or_default();
        if channels.is_empty() {
            return None;
        }
        info!("Retrieved {} channels with {:?}", channels.len(), params);
        Some(channels)
    }

    async fn genre_channels(&self, session: &MagSession, genre_id: &str) -> Vec<Value> {
        let params = [
            ("type", "itv"),
            ("action", "get_channels"),
            ("genre", genre_id),
        ];
        match self
            .call(session, &params, self.upstream.genre_listing_timeout)
            .await
        {
            Ok(response) => response.js().map(genre_listing).unwrap_or_default(),
            Err(e) => {
                debug!("Genre {} listing failed: {}", genre_id, e);
                Vec::new()
            }
        }
    }

    /// Per-genre listing in sequential batches, de-duplicated by channel id.
    async fn channels_by_genre(&self, session: &MagSession, genres: &[Genre]) -> Vec<Value> {
        let mut collected = Vec::new();
        let batch_size = self.upstream.genre_batch_size.max(1);
        for (index, batch) in genres.chunks(batch_size).enumerate() {
            let results = join_all(
                batch
                    .iter()
                    .map(|genre| self.genre_channels(session, &genre.id)),
            )
            .await;
            collected.extend(results.into_iter().flatten());
            debug!(
                "Processed {}/{} genres",
                index * batch_size + batch.len(),
                genres.len()
            );
        }

        let mut seen = HashSet::new();
        collected.retain(|item| match field_string(item, &["id"]) {
            Some(id) => seen.insert(id),
            None => true,
        });
        collected
    }

    /// Full channel listing: one-shot actions, then vendor variants, then per genre.
    ///
    /// An empty result after every strategy is reported as degraded rather
    /// than as an error; callers decide whether that is fatal.
    pub async fn get_all_channels(
        &self,
        session: &MagSession,
        genres: &[Genre],
    ) -> Outcome<Vec<SourceChannel>> {
        let raw = match first_successful(ONE_SHOT_LISTINGS.to_vec(), |params| {
            self.try_listing(session, params, self.upstream.listing_timeout, one_shot_listing)
        })
        .await
        {
            Some(raw) => raw,
            None => {
                debug!("No one-shot listing answered, trying variants");
                match first_successful(VARIANT_LISTINGS.to_vec(), |params| {
                    self.try_listing(session, params, self.upstream.metadata_timeout, variant_listing)
                })
                .await
                {
                    Some(raw) => raw,
                    None => self.channels_by_genre(session, genres).await,
                }
            }
        };

        if raw.is_empty() {
            return Outcome::degraded(Vec::new(), "every channel listing strategy came back empty");
        }

        let genre_names: HashMap<&str, &str> = genres
            .iter()
            .map(|g| (g.id.as_str(), g.title.as_str()))
            .collect();
        let channels = raw
            .iter()
            .map(|item| self.transform_channel(item, session.token.as_deref(), &genre_names))
            .collect();
        Outcome::Complete(channels)
    }

    /// Normalize one portal channel record.
    pub fn transform_channel(
        &self,
        raw: &Value,
        token: Option<&str>,
        genre_names: &HashMap<&str, &str>,
    ) -> SourceChannel {
        let name = field_string(raw, &["name", "title", "display_name"])
            .unwrap_or_else(|| "Unknown".to_string());
        let channel_id = field_string(raw, &["id", "channel_id", "channelId"])
            .unwrap_or_else(|| stable_id(&name));

        let mut channel = SourceChannel::new(SourceType::Mag, channel_id, name);
        channel.cmd = field_string(raw, &["cmd", "url"]).unwrap_or_else(|| {
            let mac: String = url::form_urlencoded::byte_serialize(self.mac.as_bytes()).collect();
            format!(
                "{}/live/{}/{}/{}.ts",
                self.base_url,
                mac,
                token.unwrap_or_default(),
                channel.channel_id
            )
        });
        channel.logo = field_string(raw, &["logo", "icon", "logo_uri"]).unwrap_or_default();
        channel.tv_genre_id = field_string(raw, &["tv_genre_id", "genre_id"]);
        channel.group = channel
            .tv_genre_id
            .as_deref()
            .and_then(|id| genre_names.get(id))
            .filter(|title| !title.is_empty())
            .map(|title| title.to_string())
            .or_else(|| field_string(raw, &["genre", "group", "category"]))
            .unwrap_or_else(|| DEFAULT_GROUP.to_string());
        channel.is_hd = flag(raw, "hd", 1);
        channel.is_4k = flag(raw, "hs", 4);
        channel.use_http_tmp_link = flag(raw, "use_http_tmp_link", 1);
        channel.age_restricted = flag(raw, "censored", 1);
        channel
    }
}

/// First non-empty string (or number rendered as text) among `keys`.
fn field_string(raw: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match raw.get(*key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn flag(raw: &Value, key: &str, expected: i64) -> bool {
    match raw.get(key) {
        Some(Value::Number(n)) => n.as_i64() == Some(expected),
        Some(Value::String(s)) => s.trim() == expected.to_string(),
        _ => false,
    }
}

/// Deterministic id for records that carry none, so resyncs keep identity.
fn stable_id(name: &str) -> String {
    let digest = Sha256::digest(name.as_bytes());
    format!("mag_{}", &hex::encode(digest)[..16])
}

fn non_empty_array(value: Option<&Value>) -> Option<Vec<Value>> {
    match value? {
        Value::Array(items) if !items.is_empty() => Some(items.clone()),
        _ => None,
    }
}

fn one_shot_listing(js: &Value) -> Vec<Value> {
    non_empty_array(Some(js))
        .or_else(|| non_empty_array(js.get("data")))
        .or_else(|| non_empty_array(js.get("items")))
        .or_else(|| non_empty_array(js.get("channels")))
        .or_else(|| {
            // Some portals key channels by number instead of returning an array
            let map = js.as_object()?;
            let first = map.values().next()?;
            (first.get("id").is_some() || first.get("name").is_some())
                .then(|| map.values().cloned().collect())
        })
        .unwrap_or_default()
}

fn variant_listing(js: &Value) -> Vec<Value> {
    non_empty_array(Some(js))
        .or_else(|| non_empty_array(js.get("data")))
        .or_else(|| non_empty_array(js.get("items")))
        .unwrap_or_default()
}

fn genre_listing(js: &Value) -> Vec<Value> {
    non_empty_array(Some(js))
        .or_else(|| non_empty_array(js.get("data")))
        .unwrap_or_default()
}

#[async_trait]
impl CatalogSource for MagClient {
    fn source_type(&self) -> SourceType {
        SourceType::Mag
    }

    async fn fetch_catalog(&self) -> SourceResult<CatalogSnapshot> {
        info!(
            "Starting portal sync for {}",
            UrlUtils::obfuscate_credentials(&self.base_url)
        );
        let session = self.handshake().await;
        let account_info = self.get_account_info(&session).await;
        let profile = self.get_profile(&session).await;
        let genres = self.get_genres(&session).await;
        for reason in [
            account_info.degraded_reason(),
            profile.degraded_reason(),
            genres.degraded_reason(),
        ]
        .into_iter()
        .flatten()
        {
            warn!("Portal metadata degraded: {}", reason);
        }

        let channels = match self.get_all_channels(&session, genres.value()).await {
            Outcome::Complete(channels) => channels,
            Outcome::Degraded { reason, .. } => {
                return Err(SourceError::CatalogUnavailable {
                    source_type: "mag".to_string(),
                    message: reason,
                });
            }
        };
        info!("Portal listed {} channels", channels.len());

        Ok(CatalogSnapshot {
            channels,
            sync_data: json!({
                "accountInfo": account_info.value(),
                "profile": profile.value(),
                "genres": genres.value(),
            }),
        })
    }

    async fn test_connection(&self) -> SourceResult<Value> {
        let session = self.handshake().await;
        let account_info = self.get_account_info(&session).await;
        Ok(json!({
            "accountInfo": account_info.into_value(),
            "apiPath": session.api_path,
            "tokenReceived": session.token.is_some(),
        }))
    }
}
