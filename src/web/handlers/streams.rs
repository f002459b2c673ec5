//! Stream resolution handlers

use axum::{
    Json,
    extract::{Path, State},
    http::HeaderMap,
    response::Response,
};
use serde::Deserialize;

use crate::proxy::proxy_resolved;
use crate::web::{
    AppState,
    responses::{bad_request, handle_error, handle_result},
};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetStreamRequest {
    #[serde(default)]
    pub playlist_id: String,
    #[serde(default)]
    pub channel_id: String,
    #[serde(default)]
    pub cmd: Option<String>,
}

/// `POST /api/channels/get-stream`
///
/// Answers `{success, url, dialect, mac?, stale}`.
pub async fn get_stream(
    State(state): State<AppState>,
    Json(request): Json<GetStreamRequest>,
) -> Response {
    if request.playlist_id.trim().is_empty() || request.channel_id.trim().is_empty() {
        return bad_request("Playlist ID and Channel ID are required");
    }
    handle_result(
        state
            .resolver
            .resolve(&request.playlist_id, &request.channel_id, request.cmd.as_deref())
            .await,
    )
}

/// `GET /api/channels/{playlist_id}/{channel_id}/stream`
///
/// Resolves the stored channel and relays it in one request.
pub async fn stream_channel(
    State(state): State<AppState>,
    Path((playlist_id, channel_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    match state.resolver.resolve(&playlist_id, &channel_id, None).await {
        Ok(resolved) => {
            proxy_resolved(&state.http, &state.config.upstream, &resolved, &headers).await
        }
        Err(e) => handle_error(e),
    }
}
