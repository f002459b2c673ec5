//! Web layer module
//!
//! This module provides the HTTP interface of the proxy. Handlers are thin
//! and delegate to the services held in [`AppState`].
//!
//! # Architecture
//!
//! - **Handlers**: HTTP request handlers organized by domain
//! - **Responses**: `{success, ...}` bodies and error to status mapping
//! - **Middleware**: request logging and the optional bearer token gate
//!
//! The raw URL proxy under `/api/proxy/*` is never gated. The channel stream
//! route accepts the API token as a `token` query parameter as well as a
//! bearer header. Only the JSON routes go through the CORS layer; the stream
//! routes answer preflights and expose headers themselves.

use anyhow::Result;
use axum::{
    Router,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::config::Config;
use crate::errors::AppResult;
use crate::ingestor::CatalogSyncService;
use crate::repositories::CatalogStore;
use crate::services::{ChannelViewService, StreamResolver};
use crate::utils::StandardHttpClient;

pub mod handlers;
pub mod middleware;
pub mod responses;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn CatalogStore>,
    pub http: StandardHttpClient,
    pub resolver: Arc<StreamResolver>,
    pub sync: Arc<CatalogSyncService>,
    pub views: Arc<ChannelViewService>,
    /// Application start time for uptime calculation
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: Arc<Config>, store: Arc<dyn CatalogStore>) -> AppResult<Self> {
        let http = StandardHttpClient::with_connection_timeout(config.upstream.connect_timeout)?;
        let upstream = config.upstream.clone();
        Ok(Self {
            resolver: Arc::new(StreamResolver::new(
                store.clone(),
                http.clone(),
                upstream.clone(),
            )),
            sync: Arc::new(CatalogSyncService::new(store.clone(), http.clone(), upstream)),
            views: Arc::new(ChannelViewService::new(store.clone())),
            config,
            store,
            http,
            started_at: Utc::now(),
        })
    }
}

/// Web server configuration and setup
pub struct WebServer {
    app: Router,
    addr: SocketAddr,
}

impl WebServer {
    pub fn new(state: AppState) -> Result<Self> {
        let addr: SocketAddr =
            format!("{}:{}", state.config.web.host, state.config.web.port).parse()?;
        Ok(Self {
            app: Self::create_router(state),
            addr,
        })
    }

    /// Full application router
    pub fn create_router(state: AppState) -> Router {
        let protected = Router::new()
            .route("/channels", get(handlers::playlists::all_channels))
            .route("/channels/get-stream", post(handlers::streams::get_stream))
            .route(
                "/playlists/test-connection",
                post(handlers::playlists::test_connection),
            )
            .route(
                "/playlists/{playlist_id}/sync",
                post(handlers::playlists::sync_playlist),
            )
            .route(
                "/playlists/{playlist_id}/channels",
                get(handlers::playlists::playlist_channels),
            )
            .route_layer(axum::middleware::from_fn_with_state(
                state.clone(),
                middleware::require_api_token,
            ))
            .layer(CorsLayer::permissive());

        // Players cannot set headers, so the token may also ride in `?token=`
        let player = Router::new()
            .route(
                "/channels/{playlist_id}/{channel_id}/stream",
                get(handlers::streams::stream_channel),
            )
            .route_layer(axum::middleware::from_fn_with_state(
                state.clone(),
                middleware::require_stream_token,
            ));

        // Stream routes write their own CORS headers
        let open = Router::new()
            .route(
                "/proxy/stream",
                get(handlers::proxy::proxy_stream_handler)
                    .options(handlers::proxy::proxy_preflight),
            )
            .route("/proxy/test", get(handlers::proxy::proxy_test));

        Router::new()
            .route("/health", get(handlers::health::health_check))
            .nest("/api", protected.merge(player).merge(open))
            .layer(axum::middleware::from_fn(
                middleware::request_logging_middleware,
            ))
            .with_state(state)
    }

    /// Serve until the token is cancelled or the process is signalled.
    pub async fn serve_with_cancellation(self, cancellation_token: CancellationToken) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(&self.addr)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", self.addr, e))?;
        info!("Web server listening on {}", self.addr);

        let shutdown_signal = async move {
            tokio::select! {
                _ = cancellation_token.cancelled() => {
                    info!("Web server received cancellation signal, shutting down gracefully");
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Received Ctrl+C, shutting down gracefully");
                    cancellation_token.cancel();
                }
            }
        };

        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal)
            .await?;
        Ok(())
    }

    /// Get the host address
    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    /// Get the port number
    pub fn port(&self) -> u16 {
        self.addr.port()
    }
}
