//! Raw URL proxy handlers

use axum::{
    Json,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::proxy::{preflight_response, proxy_stream};
use crate::web::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct ProxyQuery {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub mac: Option<String>,
}

/// `GET /api/proxy/stream?url=&mac=`
///
/// Without `mac` the device identity is picked from the URL shape, falling
/// back to the configured default MAC.
pub async fn proxy_stream_handler(
    State(state): State<AppState>,
    Query(query): Query<ProxyQuery>,
    headers: HeaderMap,
) -> Response {
    let Some(url) = query.url.filter(|u| !u.trim().is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "URL is required" })),
        )
            .into_response();
    };
    let mac = query.mac.filter(|m| !m.trim().is_empty());

    proxy_stream(
        &state.http,
        &state.config.upstream,
        &url,
        &headers,
        mac.as_deref(),
    )
    .await
}

/// `OPTIONS /api/proxy/stream`
pub async fn proxy_preflight() -> Response {
    preflight_response()
}

/// `GET /api/proxy/test`
pub async fn proxy_test() -> Response {
    Json(json!({
        "message": "Proxy route is working",
        "timestamp": Utc::now(),
    }))
    .into_response()
}
