//! Streaming HTTP proxy.
//!
//! Relays a live or on-demand media stream from an upstream that only
//! answers recognised devices, so browsers and mobile players can consume it.
//!
//! Key behaviors:
//!   - Upstream identity chosen per URL (see [`UpstreamProfile`]): MAG device
//!     emulation, or Xtream player emulation rotating through user agents.
//!   - Inbound `Range` forwarded verbatim; `206` and `Content-Range` mirrored.
//!   - Time to response headers bounded by `upstream.media_timeout`; the body
//!     is never cut off and is dropped when the client goes away.
//!   - Xtream `404` retried once with the `live/` segment toggled.
//!   - Upstream failures before headers map to 401/403/404/502 text bodies.

use std::sync::Mutex;
use std::time::Duration;

use axum::body::Body;
use axum::http::{HeaderMap, HeaderValue, Response, StatusCode, header};
use tracing::{debug, error, info, warn};

use super::upstream_headers::{UpstreamProfile, alternate_xtream_path};
use crate::config::UpstreamConfig;
use crate::models::ResolvedStream;
use crate::utils::{StandardHttpClient, UrlUtils, first_successful};

const DEFAULT_CONTENT_TYPE: &str = "video/mp2t";

/// Why an upstream could not be opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamFailure {
    Status(u16),
    Timeout,
    Transport(String),
}

impl UpstreamFailure {
    /// Client-facing status and message.
    pub fn to_client_error(&self) -> (StatusCode, String) {
        match self {
            Self::Status(401) => (
                StatusCode::UNAUTHORIZED,
                "Unauthorized - Invalid MAC or token".to_string(),
            ),
            Self::Status(403) => (StatusCode::FORBIDDEN, "Forbidden".to_string()),
            Self::Status(404) => (StatusCode::NOT_FOUND, "Stream not found".to_string()),
            Self::Status(status) => (
                StatusCode::BAD_GATEWAY,
                format!("Streaming failed: upstream responded with status {status}"),
            ),
            Self::Timeout => (
                StatusCode::BAD_GATEWAY,
                "Streaming failed: upstream did not respond in time".to_string(),
            ),
            Self::Transport(message) => (
                StatusCode::BAD_GATEWAY,
                format!("Streaming failed: {message}"),
            ),
        }
    }
}

/// Proxy a resolved stream, using the resolved MAC as the device identity.
pub async fn proxy_resolved(
    client: &StandardHttpClient,
    upstream: &UpstreamConfig,
    resolved: &ResolvedStream,
    request_headers: &HeaderMap,
) -> Response<Body> {
    proxy_stream(
        client,
        upstream,
        &resolved.url,
        request_headers,
        resolved.mac.as_deref(),
    )
    .await
}

/// Unified stream proxy function.
///
/// Returns the mirrored upstream response with the body streaming, or an
/// error response when no upstream attempt produced one.
pub async fn proxy_stream(
    client: &StandardHttpClient,
    upstream: &UpstreamConfig,
    stream_url: &str,
    request_headers: &HeaderMap,
    mac_hint: Option<&str>,
) -> Response<Body> {
    let profile = UpstreamProfile::select(stream_url, mac_hint, upstream);
    info!(
        "Proxying upstream stream {} as {}",
        UrlUtils::obfuscate_credentials(stream_url),
        if profile.is_xtream() { "player" } else { "set-top box" }
    );

    let range = request_headers.get(header::RANGE);

    let opened = match open_with_rotation(client, &profile, stream_url, range, upstream.media_timeout)
        .await
    {
        Err(UpstreamFailure::Status(404)) if profile.is_xtream() => {
            match alternate_xtream_path(stream_url) {
                Some(alternate) => {
                    debug!(
                        "Retrying with alternate path {}",
                        UrlUtils::obfuscate_credentials(&alternate)
                    );
                    open_with_rotation(client, &profile, &alternate, range, upstream.media_timeout)
                        .await
                }
                None => Err(UpstreamFailure::Status(404)),
            }
        }
        other => other,
    };

    let upstream_resp = match opened {
        Ok(response) => response,
        Err(failure) => {
            let (status, message) = failure.to_client_error();
            warn!(
                "Upstream {} failed: {:?}",
                UrlUtils::obfuscate_credentials(stream_url),
                failure
            );
            return error_response(status, &message);
        }
    };

    mirror_response(upstream_resp)
}

/// Try each header set of the profile in order; the first 2xx answer wins.
async fn open_with_rotation(
    client: &StandardHttpClient,
    profile: &UpstreamProfile,
    url: &str,
    range: Option<&HeaderValue>,
    timeout: Duration,
) -> Result<reqwest::Response, UpstreamFailure> {
    let failures = Mutex::new(Vec::new());
    let failures_ref = &failures;

    let opened = first_successful(profile.header_sets(url), move |headers| async move {
        match open_upstream(client, url, headers, range, timeout).await {
            Ok(response) => Some(response),
            Err(failure) => {
                debug!("Upstream attempt failed: {:?}", failure);
                if let Ok(mut recorded) = failures_ref.lock() {
                    recorded.push(failure);
                }
                None
            }
        }
    })
    .await;

    match opened {
        Some(response) => Ok(response),
        None => Err(failures
            .into_inner()
            .ok()
            .and_then(|mut recorded| recorded.pop())
            .unwrap_or_else(|| UpstreamFailure::Transport("no upstream attempt made".to_string()))),
    }
}

async fn open_upstream(
    client: &StandardHttpClient,
    url: &str,
    mut headers: reqwest::header::HeaderMap,
    range: Option<&HeaderValue>,
    timeout: Duration,
) -> Result<reqwest::Response, UpstreamFailure> {
    if let Some(range) = range
        && let Ok(v) = reqwest::header::HeaderValue::from_bytes(range.as_bytes())
    {
        headers.insert(reqwest::header::RANGE, v);
    }

    let send = client.inner_client().get(url).headers(headers).send();
    let response = match tokio::time::timeout(timeout, send).await {
        Ok(Ok(response)) => response,
        Ok(Err(e)) if e.is_timeout() => return Err(UpstreamFailure::Timeout),
        Ok(Err(e)) => {
            return Err(UpstreamFailure::Transport(UrlUtils::obfuscate_credentials(
                &e.to_string(),
            )));
        }
        Err(_) => return Err(UpstreamFailure::Timeout),
    };

    let status = response.status();
    if !status.is_success() {
        return Err(UpstreamFailure::Status(status.as_u16()));
    }
    Ok(response)
}

/// Build the client response around the upstream body.
fn mirror_response(upstream_resp: reqwest::Response) -> Response<Body> {
    let partial = upstream_resp.status() == reqwest::StatusCode::PARTIAL_CONTENT;
    let upstream_headers = upstream_resp.headers().clone();

    let content_type = upstream_headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string();
    let content_length = upstream_headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok());

    debug!(
        "Upstream accepted: status={} ct={} cl={:?}",
        upstream_resp.status(),
        content_type,
        content_length
    );

    let body = Body::from_stream(upstream_resp.bytes_stream());

    let mut builder = Response::builder()
        .status(if partial {
            StatusCode::PARTIAL_CONTENT
        } else {
            StatusCode::OK
        })
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CACHE_CONTROL, "no-cache, no-store, must-revalidate")
        .header(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")
        .header(header::ACCESS_CONTROL_ALLOW_HEADERS, "Range")
        .header(
            header::ACCESS_CONTROL_EXPOSE_HEADERS,
            "Content-Length, Content-Range",
        )
        .header(header::ACCEPT_RANGES, "bytes");

    if let Some(len) = content_length {
        builder = builder.header(header::CONTENT_LENGTH, len);
    }
    if partial && let Some(range) = upstream_headers.get(header::CONTENT_RANGE) {
        builder = builder.header(header::CONTENT_RANGE, range.as_bytes());
    }

    match builder.body(body) {
        Ok(response) => response,
        Err(e) => {
            error!("Failed building response object: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to build response")
        }
    }
}

/// CORS preflight answer for the stream endpoints.
pub fn preflight_response() -> Response<Body> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::NO_CONTENT;
    let headers = response.headers_mut();
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Range, Content-Type"),
    );
    headers.insert(header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static("86400"));
    response
}

/// Simple helper to construct a uniform error response.
pub fn error_response(status: StatusCode, msg: &str) -> Response<Body> {
    let mut response = Response::new(Body::from(msg.to_string()));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(UpstreamFailure::Status(401), 401, "Unauthorized - Invalid MAC or token")]
    #[case(UpstreamFailure::Status(403), 403, "Forbidden")]
    #[case(UpstreamFailure::Status(404), 404, "Stream not found")]
    #[case(UpstreamFailure::Status(503), 502, "Streaming failed: upstream responded with status 503")]
    #[case(UpstreamFailure::Transport("reset".into()), 502, "Streaming failed: reset")]
    fn maps_failures_to_client_errors(
        #[case] failure: UpstreamFailure,
        #[case] status: u16,
        #[case] message: &str,
    ) {
        let (code, text) = failure.to_client_error();
        assert_eq!(code.as_u16(), status);
        assert_eq!(text, message);
    }

    #[test]
    fn preflight_allows_range() {
        let response = preflight_response();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_HEADERS],
            "Range, Content-Type"
        );
        assert_eq!(response.headers()[header::ACCESS_CONTROL_MAX_AGE], "86400");
    }
}
