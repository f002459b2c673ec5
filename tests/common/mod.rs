#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use portal_proxy::{
    config::Config,
    models::Playlist,
    repositories::InMemoryCatalogStore,
    web::{AppState, WebServer},
};

/// Serve `router` on an ephemeral local port and return its base URL.
pub async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

pub fn playlist(value: serde_json::Value) -> Playlist {
    serde_json::from_value(value).unwrap()
}

pub async fn store_with(playlists: Vec<Playlist>) -> Arc<InMemoryCatalogStore> {
    Arc::new(InMemoryCatalogStore::with_playlists(playlists).await.unwrap())
}

pub fn app_state(config: Config, store: Arc<InMemoryCatalogStore>) -> AppState {
    AppState::new(Arc::new(config), store).unwrap()
}

pub fn app(config: Config, store: Arc<InMemoryCatalogStore>) -> Router {
    WebServer::create_router(app_state(config, store))
}
