//! Upstream request headers per dialect.
//!
//! Portals only answer clients that look like a MAG set-top box, and many
//! Xtream panels only serve media to known player user agents. Both the
//! portal client and the streaming proxy build their outbound headers here.

use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use tracing::debug;
use url::Url;

use crate::config::UpstreamConfig;
use crate::streaming::classification::{is_xtream_shaped, parse_xtream_url};

pub const MAG_USER_AGENT: &str = "Mozilla/5.0 (QtEmbedded; U; Linux; C) AppleWebKit/533.3 (KHTML, like Gecko) MAG200 stbapp ver: 2 rev: 250 Safari/533.3";
pub const MAG_X_USER_AGENT: &str = "Model: MAG250; Link: WiFi";

const X_USER_AGENT: HeaderName = HeaderName::from_static("x-user-agent");

fn insert(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(v) => {
            headers.insert(name, v);
        }
        Err(_) => debug!("Skipping invalid upstream header value for {}", name),
    }
}

/// Set-top-box emulation headers.
///
/// `referer_source` supplies the scheme and host for the `Referer`; when a
/// token exists it is sent both as a cookie and as a bearer credential.
pub fn mag_device_headers(mac: &str, token: Option<&str>, referer_source: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    insert(&mut headers, header::USER_AGENT, MAG_USER_AGENT);
    insert(&mut headers, X_USER_AGENT, MAG_X_USER_AGENT);
    insert(&mut headers, header::ACCEPT, "*/*");
    insert(&mut headers, header::ACCEPT_LANGUAGE, "en-US,en;q=0.9");
    insert(&mut headers, header::ACCEPT_ENCODING, "identity");
    insert(&mut headers, header::CONNECTION, "keep-alive");

    let mut cookie = format!("mac={mac}; stb_lang=en; timezone=GMT");
    if let Some(token) = token.filter(|t| !t.is_empty()) {
        cookie.push_str(&format!("; token={token}"));
        insert(&mut headers, header::AUTHORIZATION, &format!("Bearer {token}"));
    }
    insert(&mut headers, header::COOKIE, &cookie);

    if let Ok(url) = Url::parse(referer_source)
        && let Some(host) = url.host_str()
    {
        let host = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        insert(
            &mut headers,
            header::REFERER,
            &format!("{}://{}/c/", url.scheme(), host),
        );
    }
    headers
}

/// Player emulation headers for Xtream media fetches.
pub fn xtream_player_headers(user_agent: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    insert(&mut headers, header::USER_AGENT, user_agent);
    insert(
        &mut headers,
        header::ACCEPT,
        "video/mp2t, video/quicktime, video/*, */*",
    );
    insert(&mut headers, header::ACCEPT_LANGUAGE, "en_US");
    insert(&mut headers, header::CONNECTION, "keep-alive");
    headers
}

/// How the proxy presents itself to a media upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamProfile {
    /// Set-top-box emulation with the given MAC
    Mag { mac: String },
    /// Player emulation, user agents tried in order
    Xtream { user_agents: Vec<String> },
}

impl UpstreamProfile {
    /// Xtream-shaped URLs without a MAC hint get player emulation; everything
    /// else is fetched as a set-top box.
    pub fn select(url: &str, mac_hint: Option<&str>, upstream: &UpstreamConfig) -> Self {
        let mac_hint = mac_hint.map(str::trim).filter(|m| !m.is_empty());
        match mac_hint {
            None if is_xtream_shaped(url) => Self::Xtream {
                user_agents: upstream.xtream_user_agents.clone(),
            },
            _ => Self::Mag {
                mac: mac_hint.unwrap_or(&upstream.default_mac).to_string(),
            },
        }
    }

    /// One header set per attempt, in the order they should be tried.
    pub fn header_sets(&self, url: &str) -> Vec<HeaderMap> {
        match self {
            Self::Mag { mac } => vec![mag_device_headers(mac, None, url)],
            Self::Xtream { user_agents } => user_agents
                .iter()
                .map(|ua| xtream_player_headers(ua))
                .collect(),
        }
    }

    pub fn is_xtream(&self) -> bool {
        matches!(self, Self::Xtream { .. })
    }
}

/// The same Xtream stream with the `live/` segment toggled.
///
/// Panels disagree on whether live streams sit under `/live/`; a 404 on one
/// shape is retried once on the other.
pub fn alternate_xtream_path(raw: &str) -> Option<String> {
    let parsed = parse_xtream_url(raw)?;
    let mut url = Url::parse(raw).ok()?;
    let has_live = url
        .path_segments()
        .and_then(|mut s| s.find(|seg| !seg.is_empty()))
        .is_some_and(|first| first == "live");
    let file = match &parsed.extension {
        Some(ext) => format!("{}.{}", parsed.stream_id, ext),
        None => parsed.stream_id.clone(),
    };
    let path = if has_live {
        format!("/{}/{}/{}", parsed.username, parsed.password, file)
    } else {
        format!("/live/{}/{}/{}", parsed.username, parsed.password, file)
    };
    url.set_path(&path);
    Some(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mag_headers_carry_device_identity_and_token() {
        let headers = mag_device_headers(
            "00:1A:79:00:00:01",
            Some("tok"),
            "http://portal.example:8080/stalker_portal/c/",
        );
        assert_eq!(headers[header::USER_AGENT], MAG_USER_AGENT);
        assert_eq!(headers["x-user-agent"], MAG_X_USER_AGENT);
        assert_eq!(
            headers[header::COOKIE],
            "mac=00:1A:79:00:00:01; stb_lang=en; timezone=GMT; token=tok"
        );
        assert_eq!(headers[header::AUTHORIZATION], "Bearer tok");
        assert_eq!(headers[header::REFERER], "http://portal.example:8080/c/");
        assert_eq!(headers[header::ACCEPT_ENCODING], "identity");
    }

    #[test]
    fn mag_headers_without_token_have_no_authorization() {
        let headers = mag_device_headers("00:1A:79:00:00:01", None, "not a url");
        assert!(headers.get(header::AUTHORIZATION).is_none());
        assert!(headers.get(header::REFERER).is_none());
        assert_eq!(
            headers[header::COOKIE],
            "mac=00:1A:79:00:00:01; stb_lang=en; timezone=GMT"
        );
    }

    #[test]
    fn profile_selection() {
        let upstream = UpstreamConfig::default();
        let xtream = UpstreamProfile::select("http://panel.example/live/u/p/1.ts", None, &upstream);
        assert!(xtream.is_xtream());
        assert_eq!(
            xtream.header_sets("http://panel.example/live/u/p/1.ts").len(),
            upstream.xtream_user_agents.len()
        );

        let hinted = UpstreamProfile::select(
            "http://panel.example/live/u/p/1.ts",
            Some("00:1A:79:00:00:09"),
            &upstream,
        );
        assert_eq!(
            hinted,
            UpstreamProfile::Mag {
                mac: "00:1A:79:00:00:09".into()
            }
        );

        let direct = UpstreamProfile::select("http://cdn.example/play/live.php?stream=1", None, &upstream);
        assert_eq!(
            direct,
            UpstreamProfile::Mag {
                mac: "00:1A:79:00:00:00".into()
            }
        );
    }

    #[test]
    fn toggles_live_segment() {
        assert_eq!(
            alternate_xtream_path("http://panel.example/live/u/p/1.ts").as_deref(),
            Some("http://panel.example/u/p/1.ts")
        );
        assert_eq!(
            alternate_xtream_path("http://panel.example:8080/u/p/1?x=1").as_deref(),
            Some("http://panel.example:8080/live/u/p/1?x=1")
        );
        assert!(alternate_xtream_path("http://cdn.example/a.m3u8").is_none());
    }
}
