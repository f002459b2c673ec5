//! Playlist administration handlers

use axum::{
    Json,
    extract::{Path, State},
    response::Response,
};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::errors::AppResult;
use crate::services::ChannelView;
use crate::sources::{ConnectionParams, SourceClientFactory};
use crate::utils::UrlUtils;
use crate::web::{AppState, responses::handle_result};

#[derive(Debug, Serialize)]
pub struct ChannelList {
    pub count: usize,
    pub channels: Vec<ChannelView>,
}

impl From<Vec<ChannelView>> for ChannelList {
    fn from(channels: Vec<ChannelView>) -> Self {
        Self {
            count: channels.len(),
            channels,
        }
    }
}

/// `POST /api/playlists/{playlist_id}/sync`
pub async fn sync_playlist(
    State(state): State<AppState>,
    Path(playlist_id): Path<String>,
) -> Response {
    handle_result(state.sync.sync_playlist(&playlist_id).await)
}

/// `GET /api/playlists/{playlist_id}/channels`
pub async fn playlist_channels(
    State(state): State<AppState>,
    Path(playlist_id): Path<String>,
) -> Response {
    handle_result(
        state
            .views
            .for_playlist(&playlist_id)
            .await
            .map(ChannelList::from),
    )
}

/// `GET /api/channels`
pub async fn all_channels(State(state): State<AppState>) -> Response {
    handle_result(
        state
            .views
            .for_active_playlists()
            .await
            .map(ChannelList::from),
    )
}

/// `POST /api/playlists/test-connection`
pub async fn test_connection(
    State(state): State<AppState>,
    Json(params): Json<ConnectionParams>,
) -> Response {
    handle_result(run_connection_test(&state, &params).await)
}

async fn run_connection_test(state: &AppState, params: &ConnectionParams) -> AppResult<Value> {
    info!(
        "Testing {:?} connection to {}",
        params.playlist_type,
        UrlUtils::obfuscate_credentials(&params.source_url)
    );
    let playlist = params.to_playlist();
    let client = SourceClientFactory::create(
        &playlist,
        params.playlist_type,
        &state.http,
        &state.config.upstream,
    )?;
    Ok(client.test_connection().await?)
}
