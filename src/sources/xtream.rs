//! Xtream Codes panel client
//!
//! Authenticates against `player_api.php` and lists live streams. Credential
//! validity is never cached: every sync or connection test authenticates again.

use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info};

use super::traits::{CatalogSnapshot, CatalogSource};
use crate::config::UpstreamConfig;
use crate::errors::{AppError, AppResult, SourceError, SourceResult};
use crate::models::{DEFAULT_GROUP, Playlist, PlaylistType, SourceChannel, SourceType};
use crate::streaming::classification::xtream_stream_url;
use crate::utils::{StandardHttpClient, UrlUtils};

/// Xtream client for one set of credentials.
pub struct XtreamClient {
    base_url: String,
    username: String,
    password: String,
    http: StandardHttpClient,
    upstream: UpstreamConfig,
}

/// Account details returned by the handshake action.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct XtreamUserInfo {
    #[serde(default)]
    pub status: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Successful authentication.
#[derive(Debug, Clone)]
pub struct XtreamAccount {
    pub user: XtreamUserInfo,
    pub categories: Value,
}

#[derive(Debug, Clone, Deserialize)]
struct XtreamHandshake {
    #[serde(default)]
    user: Option<XtreamUserInfo>,
    #[serde(default)]
    user_info: Option<XtreamUserInfo>,
    #[serde(default)]
    categories: Value,
}

/// Live stream record from `get_live_streams`.
#[derive(Debug, Clone, Deserialize)]
struct XtreamLiveStream {
    #[serde(deserialize_with = "deserialize_string_or_int")]
    stream_id: i64,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    stream_icon: Option<String>,
    #[serde(default)]
    category_name: Option<String>,
    #[serde(default)]
    epg_channel_id: Option<String>,
    #[serde(deserialize_with = "deserialize_string_or_int_option", default)]
    hd: Option<i64>,
}

impl XtreamClient {
    pub fn new(
        base_url: &str,
        username: &str,
        password: &str,
        http: StandardHttpClient,
        upstream: UpstreamConfig,
    ) -> Self {
        Self {
            base_url: UrlUtils::sanitize(base_url),
            username: username.to_string(),
            password: password.to_string(),
            http,
            upstream,
        }
    }

    /// Build a client after checking the credential invariant of the playlist.
    pub fn from_playlist(
        playlist: &Playlist,
        http: StandardHttpClient,
        upstream: UpstreamConfig,
    ) -> AppResult<Self> {
        playlist.validate_for(PlaylistType::Xtream)?;
        let (username, password) = playlist.xtream_credentials().ok_or_else(|| {
            AppError::validation(format!(
                "Xtream playlist '{}' requires username and password",
                playlist.name
            ))
        })?;
        Ok(Self::new(
            &playlist.xtream_base_url(),
            &username,
            &password,
            http,
            upstream,
        ))
    }

    fn api_url(&self) -> String {
        format!("{}/player_api.php", self.base_url)
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(ua) = self.upstream.xtream_user_agents.first()
            && let Ok(value) = HeaderValue::from_str(ua)
        {
            headers.insert(header::USER_AGENT, value);
        }
        headers
    }

    /// Verify the credentials. Any status other than `Active` is an
    /// authentication failure.
    pub async fn authenticate(&self) -> SourceResult<XtreamAccount> {
        debug!(
            "Authenticating against {}",
            UrlUtils::obfuscate_credentials(&self.api_url())
        );
        let handshake: XtreamHandshake = self
            .http
            .get_json(
                &self.api_url(),
                &[
                    ("username", self.username.as_str()),
                    ("password", self.password.as_str()),
                    ("action", "handshake"),
                ],
                self.headers(),
                self.upstream.metadata_timeout,
            )
            .await?;

        let user = handshake.user.or(handshake.user_info).ok_or_else(|| {
            SourceError::auth_failed("xtream", "server did not return user information")
        })?;
        if user.status != "Active" {
            return Err(SourceError::auth_failed(
                "xtream",
                format!("user status is {}", user.status),
            ));
        }

        Ok(XtreamAccount {
            user,
            categories: handshake.categories,
        })
    }

    /// All live streams. Transport and decode failures are fatal.
    pub async fn list_live_channels(&self) -> SourceResult<Vec<SourceChannel>> {
        let body: Value = self
            .http
            .get_json(
                &self.api_url(),
                &[
                    ("username", self.username.as_str()),
                    ("password", self.password.as_str()),
                    ("action", "get_live_streams"),
                ],
                self.headers(),
                self.upstream.listing_timeout,
            )
            .await?;

        let items = match body {
            Value::Array(_) => body,
            Value::Object(mut map) => map.remove("data").unwrap_or(Value::Array(Vec::new())),
            other => {
                return Err(SourceError::parse(
                    "xtream",
                    format!("unexpected live stream listing: {other}"),
                ));
            }
        };
        let streams: Vec<XtreamLiveStream> = serde_json::from_value(items)
            .map_err(|e| SourceError::parse("xtream", format!("invalid live stream record: {e}")))?;

        info!("Retrieved {} live channels from Xtream panel", streams.len());
        Ok(streams
            .into_iter()
            .map(|stream| self.transform_stream(stream))
            .collect())
    }

    /// Canonical stream URL for a stream id.
    pub fn stream_url(&self, stream_id: &str, container: &str) -> String {
        xtream_stream_url(
            &self.base_url,
            &self.username,
            &self.password,
            stream_id,
            container,
        )
    }

    fn transform_stream(&self, stream: XtreamLiveStream) -> SourceChannel {
        let id = stream.stream_id.to_string();
        let name = stream
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| "Unknown".to_string());
        let mut channel = SourceChannel::new(SourceType::Xtream, id.clone(), name);
        channel.cmd = self.stream_url(&id, "ts");
        channel.url = channel.cmd.clone();
        channel.logo = stream.stream_icon.unwrap_or_default();
        channel.group = stream
            .category_name
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_GROUP.to_string());
        channel.epg_id = stream.epg_channel_id.unwrap_or_default();
        channel.is_hd = stream.hd == Some(1);
        channel
    }
}

#[async_trait]
impl CatalogSource for XtreamClient {
    fn source_type(&self) -> SourceType {
        SourceType::Xtream
    }

    async fn fetch_catalog(&self) -> SourceResult<CatalogSnapshot> {
        let account = self.authenticate().await?;
        let channels = self.list_live_channels().await?;
        Ok(CatalogSnapshot {
            channels,
            sync_data: json!({
                "serverInfo": account.user,
                "categories": account.categories,
            }),
        })
    }

    async fn test_connection(&self) -> SourceResult<Value> {
        let account = self.authenticate().await?;
        Ok(json!({ "userInfo": account.user }))
    }
}

fn deserialize_string_or_int<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::{self, Unexpected, Visitor};

    struct StringOrIntVisitor;

    impl<'de> Visitor<'de> for StringOrIntVisitor {
        type Value = i64;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a string or integer")
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(value)
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            i64::try_from(value).map_err(|_| E::invalid_value(Unexpected::Unsigned(value), &self))
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            value
                .trim()
                .parse()
                .map_err(|_| E::invalid_value(Unexpected::Str(value), &self))
        }
    }

    deserializer.deserialize_any(StringOrIntVisitor)
}

fn deserialize_string_or_int_option<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::{self, Visitor};

    struct StringOrIntOptionVisitor;

    impl<'de> Visitor<'de> for StringOrIntOptionVisitor {
        type Value = Option<i64>;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a string, integer, or null")
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(value))
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(i64::try_from(value).ok())
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            // Panels send "" for unset numeric fields
            Ok(value.trim().parse().ok())
        }
    }

    deserializer.deserialize_any(StringOrIntOptionVisitor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, extract::Query, routing::get};
    use std::collections::HashMap;
    use std::time::Duration;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    async fn player_api(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
        let status = if params.get("password").map(String::as_str) == Some("good") {
            "Active"
        } else {
            "Banned"
        };
        match params.get("action").map(String::as_str) {
            Some("handshake") => Json(json!({
                "user": { "status": status, "exp_date": "1900000000" },
                "categories": [{ "category_id": "1", "category_name": "News" }],
            })),
            Some("get_live_streams") => Json(json!({
                "data": [
                    { "stream_id": "101", "name": "BBC One", "stream_icon": "http://x/bbc.png",
                      "category_name": "News", "epg_channel_id": "bbc1.uk", "hd": 1 },
                    { "stream_id": 102, "name": "Local", "stream_icon": null,
                      "category_name": "", "epg_channel_id": null, "hd": "" },
                ]
            })),
            _ => Json(json!([])),
        }
    }

    fn client(base: &str, password: &str) -> XtreamClient {
        XtreamClient::new(
            base,
            "alice",
            password,
            StandardHttpClient::with_connection_timeout(Duration::from_secs(2)).unwrap(),
            UpstreamConfig::default(),
        )
    }

    #[tokio::test]
    async fn fetches_catalog_from_wrapped_listing() {
        let base = serve(Router::new().route("/player_api.php", get(player_api))).await;
        let snapshot = client(&base, "good").fetch_catalog().await.unwrap();

        assert_eq!(snapshot.channels.len(), 2);
        let bbc = &snapshot.channels[0];
        assert_eq!(bbc.channel_id, "101");
        assert_eq!(bbc.cmd, format!("{base}/live/alice/good/101.ts"));
        assert_eq!(bbc.epg_id, "bbc1.uk");
        assert!(bbc.is_hd);
        let local = &snapshot.channels[1];
        assert_eq!(local.group, DEFAULT_GROUP);
        assert!(!local.is_hd);
        assert_eq!(snapshot.sync_data["serverInfo"]["status"], "Active");
        assert_eq!(snapshot.sync_data["categories"][0]["category_name"], "News");
    }

    #[tokio::test]
    async fn inactive_account_is_an_authentication_failure() {
        let base = serve(Router::new().route("/player_api.php", get(player_api))).await;
        let err = client(&base, "bad").authenticate().await.unwrap_err();
        assert!(matches!(err, SourceError::AuthenticationFailed { .. }));
        assert!(err.to_string().contains("user status is Banned"));
    }

    #[tokio::test]
    async fn unreachable_panel_is_fatal() {
        let err = client("http://127.0.0.1:9", "good")
            .list_live_channels()
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::Connection { .. }));
    }

    #[test]
    fn stream_url_is_pure() {
        let c = client("http://panel.example:8080/", "pw");
        assert_eq!(
            c.stream_url("42", "m3u8"),
            "http://panel.example:8080/live/alice/pw/42.m3u8"
        );
    }
}
