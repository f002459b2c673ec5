/*!
 * Stream Classification Module
 * ============================
 *
 * Decides which upstream dialect governs a stored channel reference (a MAG
 * `cmd`, an Xtream URL or a plain URL) before it is resolved.
 *
 * Strategy:
 *   An ordered list of named matchers is evaluated against the extracted URL
 *   and the owning playlist. The first matcher that claims the input wins:
 *
 * ```text
 *     1. external-xtream   Xtream-shaped URL on a foreign host, passed through
 *     2. same-host-xtream  Xtream-shaped URL on the playlist host, rebuilt
 *                          with the playlist's own credentials
 *     3. xtream-playlist   playlist type xtream, canonical URL from credentials
 *     4. mag-portal        playlist type mag/stalker, needs live negotiation
 *     5. passthrough       always matches; the extracted URL as-is
 * ```
 *
 * Xtream-shape detection deliberately runs before the playlist-type check.
 * Classification is pure: no network access, never fails.
 */

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;
use url::Url;

use crate::models::{Dialect, Playlist, PlaylistType};
use crate::utils::url::UrlUtils;

static PLAYER_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^ff(mpeg|rt)\s+").expect("literal pattern"));

static HTTP_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://\S+").expect("literal pattern"));

static STREAM_ID_SEGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)(?:\.(ts|m3u8|mp4))?$").expect("literal pattern")
});

/// Pull the playable URL out of a stored cmd.
///
/// Strips a leading `ffmpeg `/`ffrt ` player invocation and control
/// whitespace, then returns the first `http(s)://` run.
pub fn extract_url(cmd: &str) -> Option<String> {
    let stripped = PLAYER_PREFIX.replace(cmd.trim_start(), "");
    let cleaned: String = stripped
        .chars()
        .filter(|c| !matches!(c, '\t' | '\n' | '\r'))
        .collect();
    HTTP_URL
        .find(cleaned.trim())
        .map(|m| m.as_str().to_string())
}

/// Components of a canonical Xtream stream URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XtreamUrl {
    /// `scheme://host[:port]`
    pub base: String,
    pub username: String,
    pub password: String,
    pub stream_id: String,
    pub extension: Option<String>,
}

impl XtreamUrl {
    /// Rebuild the URL, keeping the original extension or defaulting to `ts`.
    pub fn to_url(&self) -> String {
        format!(
            "{}/live/{}/{}/{}.{}",
            self.base,
            self.username,
            self.password,
            self.stream_id,
            self.extension.as_deref().unwrap_or("ts")
        )
    }
}

fn path_segments(url: &Url) -> Vec<String> {
    url.path_segments()
        .map(|segments| {
            segments
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Parse `host/u/p/123[.ext]` or `host/live/u/p/123[.ext]`.
pub fn parse_xtream_url(raw: &str) -> Option<XtreamUrl> {
    let url = Url::parse(raw).ok()?;
    let segments = path_segments(&url);
    let (username, password, last) = match segments.as_slice() {
        [user, pass, last] => (user, pass, last),
        [live, user, pass, last] if live == "live" => (user, pass, last),
        _ => return None,
    };
    let captures = STREAM_ID_SEGMENT.captures(last)?;
    Some(XtreamUrl {
        base: UrlUtils::origin(raw)?,
        username: username.clone(),
        password: password.clone(),
        stream_id: captures.get(1)?.as_str().to_string(),
        extension: captures.get(2).map(|m| m.as_str().to_string()),
    })
}

/// True for the canonical Xtream path shapes; query and fragment are ignored.
pub fn is_xtream_shaped(raw: &str) -> bool {
    parse_xtream_url(raw).is_some()
}

/// Canonical Xtream stream URL.
pub fn xtream_stream_url(
    base: &str,
    username: &str,
    password: &str,
    stream_id: &str,
    container: &str,
) -> String {
    format!(
        "{}/live/{}/{}/{}.{}",
        base.trim_end_matches('/'),
        username,
        password,
        stream_id,
        container
    )
}

/// Append `.ts` to the final path segment when it carries no extension.
pub fn ensure_ts_extension(raw: &str) -> String {
    let Ok(mut url) = Url::parse(raw) else {
        return raw.to_string();
    };
    let path = url.path().to_string();
    let last = path.rsplit('/').next().unwrap_or_default();
    if last.is_empty() || last.contains('.') {
        return raw.to_string();
    }
    url.set_path(&format!("{path}.ts"));
    url.to_string()
}

/// Add `stream=<channel_id>` to `live.php` URLs that lack one.
pub fn inject_stream_id(raw: &str, channel_id: &str) -> String {
    let Ok(mut url) = Url::parse(raw) else {
        return raw.to_string();
    };
    let targets_live_php = url.path().ends_with("live.php");
    let has_stream = url.query_pairs().any(|(k, v)| k == "stream" && !v.is_empty());
    if !targets_live_php || has_stream || channel_id.trim().is_empty() {
        return raw.to_string();
    }
    url.query_pairs_mut().append_pair("stream", channel_id);
    url.to_string()
}

/// Everything a matcher may look at.
#[derive(Debug, Clone)]
pub struct ClassifierInput<'a> {
    pub cmd: &'a str,
    pub channel_id: &'a str,
    pub playlist: &'a Playlist,
    /// Stored or detected playlist type
    pub playlist_type: Option<PlaylistType>,
}

/// Facts derived once from the input and shared by every matcher.
#[derive(Debug, Clone)]
pub struct Probe {
    pub raw_url: Option<String>,
    pub xtream: Option<XtreamUrl>,
    pub same_host: bool,
}

impl Probe {
    pub fn new(input: &ClassifierInput<'_>) -> Self {
        let raw_url = extract_url(input.cmd);
        let xtream = raw_url.as_deref().and_then(parse_xtream_url);
        let same_host = match (
            raw_url.as_deref().and_then(UrlUtils::extract_domain),
            input.playlist.source_host(),
        ) {
            (Some(url_host), Some(playlist_host)) => url_host.eq_ignore_ascii_case(&playlist_host),
            _ => false,
        };
        Self {
            raw_url,
            xtream,
            same_host,
        }
    }
}

/// Where a stored channel reference should be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamRoute {
    /// Foreign Xtream URL, used as-is apart from the `.ts` fix-up
    ExternalXtream { url: String },
    /// Xtream URL rebuilt from the playlist credentials
    SameHostXtream { url: String },
    /// Canonical URL for an Xtream playlist; `None` when nothing could be built
    XtreamPlaylist { url: Option<String> },
    /// Needs a portal handshake and `create_link`
    MagPortal { stored_url: Option<String> },
    /// Extracted URL with stream id injection
    Passthrough { url: Option<String> },
}

impl StreamRoute {
    pub fn dialect(&self) -> Dialect {
        match self {
            Self::ExternalXtream { .. } | Self::SameHostXtream { .. } | Self::XtreamPlaylist { .. } => {
                Dialect::Xtream
            }
            Self::MagPortal { .. } => Dialect::Mag,
            Self::Passthrough { .. } => Dialect::Direct,
        }
    }
}

/// Classification output with diagnostic context.
#[derive(Debug, Clone)]
pub struct ClassificationResult {
    pub matcher: &'static str,
    pub route: StreamRoute,
    pub reasons: Vec<String>,
}

type MatchFn = fn(&ClassifierInput<'_>, &Probe) -> Option<StreamRoute>;

/// A named classification strategy.
#[derive(Clone, Copy)]
pub struct Matcher {
    pub name: &'static str,
    pub matches: MatchFn,
}

/// Matchers in priority order. The last one always matches.
pub const MATCHERS: &[Matcher] = &[
    Matcher {
        name: "external-xtream",
        matches: match_external_xtream,
    },
    Matcher {
        name: "same-host-xtream",
        matches: match_same_host_xtream,
    },
    Matcher {
        name: "xtream-playlist",
        matches: match_xtream_playlist,
    },
    Matcher {
        name: "mag-portal",
        matches: match_mag_portal,
    },
    Matcher {
        name: "passthrough",
        matches: match_passthrough,
    },
];

fn match_external_xtream(_input: &ClassifierInput<'_>, probe: &Probe) -> Option<StreamRoute> {
    if probe.xtream.is_none() || probe.same_host {
        return None;
    }
    let raw = probe.raw_url.as_deref()?;
    Some(StreamRoute::ExternalXtream {
        url: ensure_ts_extension(raw),
    })
}

fn match_same_host_xtream(input: &ClassifierInput<'_>, probe: &Probe) -> Option<StreamRoute> {
    let parsed = probe.xtream.as_ref().filter(|_| probe.same_host)?;
    let url = match input.playlist.xtream_credentials() {
        Some((username, password)) => XtreamUrl {
            username,
            password,
            ..parsed.clone()
        }
        .to_url(),
        None => parsed.to_url(),
    };
    Some(StreamRoute::SameHostXtream { url })
}

fn match_xtream_playlist(input: &ClassifierInput<'_>, probe: &Probe) -> Option<StreamRoute> {
    if input.playlist_type != Some(PlaylistType::Xtream) {
        return None;
    }
    let canonical = input
        .playlist
        .xtream_credentials()
        .filter(|_| !input.channel_id.trim().is_empty())
        .map(|(username, password)| {
            xtream_stream_url(
                &input.playlist.xtream_base_url(),
                &username,
                &password,
                input.channel_id,
                "ts",
            )
        });
    Some(StreamRoute::XtreamPlaylist {
        url: canonical.or_else(|| probe.raw_url.clone()),
    })
}

fn match_mag_portal(input: &ClassifierInput<'_>, probe: &Probe) -> Option<StreamRoute> {
    input
        .playlist_type
        .filter(PlaylistType::is_portal)
        .map(|_| StreamRoute::MagPortal {
            stored_url: probe.raw_url.clone(),
        })
}

fn match_passthrough(input: &ClassifierInput<'_>, probe: &Probe) -> Option<StreamRoute> {
    Some(StreamRoute::Passthrough {
        url: probe
            .raw_url
            .as_deref()
            .map(|raw| inject_stream_id(raw, input.channel_id)),
    })
}

/// Run the matchers in order and return the first match.
pub fn classify(input: &ClassifierInput<'_>) -> ClassificationResult {
    let probe = Probe::new(input);
    let mut reasons = vec![format!(
        "extracted url: {}",
        probe
            .raw_url
            .as_deref()
            .map(UrlUtils::obfuscate_credentials)
            .unwrap_or_else(|| "<none>".to_string())
    )];
    if probe.xtream.is_some() {
        reasons.push(format!("xtream-shaped (same host: {})", probe.same_host));
    }

    for matcher in MATCHERS {
        if let Some(route) = (matcher.matches)(input, &probe) {
            reasons.push(format!("matched {}", matcher.name));
            debug!(
                target = "stream.classify",
                channel_id = input.channel_id,
                matcher = matcher.name,
                "classification complete"
            );
            return ClassificationResult {
                matcher: matcher.name,
                route,
                reasons,
            };
        }
        reasons.push(format!("{} did not match", matcher.name));
    }

    // The passthrough matcher always claims the input; this keeps the
    // function total even if the table is edited.
    ClassificationResult {
        matcher: "passthrough",
        route: StreamRoute::Passthrough {
            url: probe.raw_url,
        },
        reasons,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    fn playlist(source_url: &str, playlist_type: Option<PlaylistType>) -> Playlist {
        let mut p: Playlist = serde_json::from_value(serde_json::json!({
            "id": "p1",
            "name": "test",
            "sourceUrl": source_url,
        }))
        .unwrap();
        p.playlist_type = playlist_type;
        p
    }

    fn xtream_playlist() -> Playlist {
        let mut p = playlist("http://panel.example:8080", Some(PlaylistType::Xtream));
        p.xtream_username = Some("alice".into());
        p.xtream_password = Some("fresh".into());
        p
    }

    fn run(cmd: &str, channel_id: &str, playlist: &Playlist) -> ClassificationResult {
        classify(&ClassifierInput {
            cmd,
            channel_id,
            playlist,
            playlist_type: playlist.playlist_type,
        })
    }

    #[rstest]
    #[case("ffmpeg http://portal.example/play/live.php?stream=1", Some("http://portal.example/play/live.php?stream=1"))]
    #[case("FFRT   https://cdn.example/a.m3u8", Some("https://cdn.example/a.m3u8"))]
    #[case("ffmpeg http://host/\tch/\r\n12", Some("http://host/ch/12"))]
    #[case("ffmpeg /ch/12", None)]
    #[case("", None)]
    fn extracts_urls(#[case] cmd: &str, #[case] expected: Option<&str>) {
        assert_eq!(extract_url(cmd).as_deref(), expected);
    }

    #[rstest]
    #[case("http://host/live/u/p/12345", true)]
    #[case("http://host/u/p/12345.ts", true)]
    #[case("http://host/live/u/p/12345.m3u8?token=x", true)]
    #[case("http://host/u/p/12345.mkv", false)]
    #[case("http://host/a/b/c/d", false)]
    #[case("http://host/a/u/p/12345", false)]
    #[case("http://host/play/live.php?stream=1", false)]
    fn detects_xtream_shape(#[case] url: &str, #[case] expected: bool) {
        assert_eq!(is_xtream_shaped(url), expected);
    }

    #[test]
    fn external_xtream_passes_through_with_ts_suffix() {
        let result = run("http://other.example/live/bob/old/77", "77", &xtream_playlist());
        assert_eq!(result.matcher, "external-xtream");
        assert_eq!(
            result.route,
            StreamRoute::ExternalXtream {
                url: "http://other.example/live/bob/old/77.ts".into()
            }
        );
        assert_eq!(result.route.dialect(), Dialect::Xtream);
    }

    #[test]
    fn same_host_xtream_prefers_playlist_credentials() {
        let result = run("http://panel.example:8080/bob/stale/77.m3u8", "77", &xtream_playlist());
        assert_eq!(result.matcher, "same-host-xtream");
        assert_eq!(
            result.route,
            StreamRoute::SameHostXtream {
                url: "http://panel.example:8080/live/alice/fresh/77.m3u8".into()
            }
        );
    }

    #[test]
    fn xtream_shape_wins_over_portal_type() {
        let mut p = playlist("http://portal.example/c/", Some(PlaylistType::Mag));
        p.mac_address = Some("00:1A:79:00:00:01".into());
        let result = run("ffmpeg http://cdn.example/live/u/p/5", "5", &p);
        assert_eq!(result.matcher, "external-xtream");
    }

    #[test]
    fn xtream_playlist_builds_canonical_url() {
        let result = run("", "991", &xtream_playlist());
        assert_eq!(
            result.route,
            StreamRoute::XtreamPlaylist {
                url: Some("http://panel.example:8080/live/alice/fresh/991.ts".into())
            }
        );
    }

    #[test]
    fn portal_playlists_route_to_mag() {
        let p = playlist("http://portal.example/c/", Some(PlaylistType::Stalker));
        let result = run("ffmpeg http://localhost/ch/1234_", "1234", &p);
        assert_eq!(result.matcher, "mag-portal");
        assert_eq!(
            result.route,
            StreamRoute::MagPortal {
                stored_url: Some("http://localhost/ch/1234_".into())
            }
        );
    }

    #[rstest]
    #[case("http://cdn.example/play/live.php?mac=m", "42", "http://cdn.example/play/live.php?mac=m&stream=42")]
    #[case("http://cdn.example/play/live.php?stream=7", "42", "http://cdn.example/play/live.php?stream=7")]
    #[case("http://cdn.example/hls/index.m3u8", "42", "http://cdn.example/hls/index.m3u8")]
    fn passthrough_injects_missing_stream_id(
        #[case] cmd: &str,
        #[case] channel_id: &str,
        #[case] expected: &str,
    ) {
        let p = playlist("http://lists.example/tv.m3u", Some(PlaylistType::M3u));
        let result = run(cmd, channel_id, &p);
        assert_eq!(result.matcher, "passthrough");
        assert_eq!(
            result.route,
            StreamRoute::Passthrough {
                url: Some(expected.into())
            }
        );
    }

    #[test]
    fn unrecognised_input_degrades_to_passthrough() {
        let p = playlist("http://lists.example/tv.m3u", None);
        let result = run("not a url at all", "1", &p);
        assert_eq!(result.route, StreamRoute::Passthrough { url: None });
        assert_eq!(result.route.dialect(), Dialect::Direct);
    }

    proptest! {
        #[test]
        fn prefixed_cmds_extract_to_http(
            prefix in prop::sample::select(vec!["ffmpeg ", "FFMPEG  ", "ffrt ", "ffrt\t"]),
            host in "[a-z]{3,10}\\.[a-z]{2,3}",
            path in "[a-z0-9/]{0,20}",
        ) {
            let cmd = format!("{prefix}http://{host}/{path}");
            let url = extract_url(&cmd).unwrap();
            prop_assert!(url.starts_with("http"));
        }

        #[test]
        fn canonical_urls_classify_as_same_host(
            stream_id in 1u32..10_000_000,
            user in "[a-z]{3,8}",
            pass in "[a-z0-9]{3,8}",
        ) {
            let mut p = xtream_playlist();
            p.xtream_username = Some(user.clone());
            p.xtream_password = Some(pass.clone());
            let id = stream_id.to_string();
            let url = xtream_stream_url(&p.xtream_base_url(), &user, &pass, &id, "ts");
            let result = run(&url, &id, &p);
            prop_assert_eq!(result.matcher, "same-host-xtream");
            prop_assert_eq!(result.route, StreamRoute::SameHostXtream { url });
        }
    }
}
