//! HTTP middleware
//!
//! Request logging with per-request ids, and the optional bearer token gate
//! in front of the API routes.

use axum::{
    Json,
    extract::{Request, State},
    http::{HeaderValue, Method, StatusCode, Uri, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::time::Instant;
use tracing::{info, warn};

use super::AppState;
use super::responses::ApiError;

/// Header carrying the request id back to the client.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Request logging middleware
///
/// Logs all incoming requests with timing information
pub async fn request_logging_middleware(
    method: Method,
    uri: Uri,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let request_id = uuid::Uuid::new_v4().to_string();

    info!(
        method = %method,
        uri = %uri.path(),
        request_id = %request_id,
        "HTTP request started"
    );

    let mut response = next.run(request).await;
    let status = response.status().as_u16();
    let duration = start.elapsed();

    if status >= 400 {
        warn!(
            method = %method,
            uri = %uri.path(),
            status = status,
            request_id = %request_id,
            duration_ms = duration.as_millis(),
            "HTTP request completed with error"
        );
    } else {
        info!(
            method = %method,
            uri = %uri.path(),
            status = status,
            request_id = %request_id,
            duration_ms = duration.as_millis(),
            "HTTP request completed"
        );
    }

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

/// Bearer token gate
///
/// Passes everything through when no token is configured. Preflight requests
/// are never gated.
pub async fn require_api_token(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    gate(state.config.web.api_token.as_deref(), false, request, next).await
}

/// Token gate for routes a media player opens directly.
///
/// Same as [`require_api_token`], but a `token` query parameter is accepted
/// in place of the bearer header.
pub async fn require_stream_token(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    gate(state.config.web.api_token.as_deref(), true, request, next).await
}

async fn gate(
    expected: Option<&str>,
    allow_query: bool,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = expected else {
        return next.run(request).await;
    };
    if request.method() == Method::OPTIONS {
        return next.run(request).await;
    }

    let bearer = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|v| v.trim().to_string());
    let presented = match bearer {
        Some(token) => Some(token),
        None if allow_query => query_token(request.uri()),
        None => None,
    };

    if presented.as_deref() == Some(expected) {
        next.run(request).await
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(ApiError::new("Authentication required")),
        )
            .into_response()
    }
}

fn query_token(uri: &Uri) -> Option<String> {
    url::form_urlencoded::parse(uri.query()?.as_bytes())
        .find(|(key, value)| key == "token" && !value.is_empty())
        .map(|(_, value)| value.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_is_read_from_query() {
        let uri: Uri = "/api/channels/p/1/stream?x=1&token=s%20t".parse().unwrap();
        assert_eq!(query_token(&uri).as_deref(), Some("s t"));

        let empty: Uri = "/api/channels/p/1/stream?token=".parse().unwrap();
        assert_eq!(query_token(&empty), None);
        let bare: Uri = "/api/channels/p/1/stream".parse().unwrap();
        assert_eq!(query_token(&bare), None);
    }
}
