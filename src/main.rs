use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use portal_proxy::{
    config::Config,
    ingestor::SyncScheduler,
    repositories::{CatalogStore, InMemoryCatalogStore},
    web::{AppState, WebServer},
};

#[derive(Parser)]
#[command(name = "portal-proxy")]
#[command(version)]
#[command(about = "Stream resolver and proxy for MAG/Stalker portals, Xtream panels and M3U playlists")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Listening IP address
    #[arg(short = 'H', long, value_name = "IP")]
    host: Option<String>,

    /// Listening port
    #[arg(short, long, value_name = "PORT")]
    port: Option<u16>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_filter = if cli.log_level == "trace" {
        format!("portal_proxy={},tower_http=trace", cli.log_level)
    } else {
        format!("portal_proxy={}", cli.log_level)
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| log_filter.into());
    if cli.json_logs {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    info!("Starting Portal Proxy v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load_from_file(&cli.config)?;
    if let Some(host) = cli.host {
        config.web.host = host;
    }
    if let Some(port) = cli.port {
        config.web.port = port;
    }

    let playlists = std::mem::take(&mut config.playlists)
        .into_iter()
        .map(|seed| seed.into_playlist());
    let store: Arc<dyn CatalogStore> =
        Arc::new(InMemoryCatalogStore::with_playlists(playlists).await?);
    info!(
        "Catalog store seeded with {} playlists",
        store.list_playlists().await?.len()
    );

    let config = Arc::new(config);
    let state = AppState::new(config.clone(), store)?;
    let cancellation = CancellationToken::new();

    if config.sync.run_on_startup {
        let sync = state.sync.clone();
        tokio::spawn(async move {
            match sync.sync_all_active().await {
                Ok(count) => info!("Startup sync finished: {} playlists synced", count),
                Err(e) => warn!("Startup sync failed: {}", e),
            }
        });
    }

    if let Some(expression) = &config.sync.cron {
        let scheduler = SyncScheduler::new(expression, state.sync.clone(), cancellation.clone())?;
        tokio::spawn(scheduler.start());
        info!("Catalog sync scheduled with '{}'", expression);
    }

    let server = WebServer::new(state)?;
    info!("Serving on {}:{}", server.host(), server.port());
    if let Err(e) = server.serve_with_cancellation(cancellation.clone()).await {
        error!("Web server failed: {}", e);
        cancellation.cancel();
        return Err(e);
    }
    cancellation.cancel();
    info!("Shutdown complete");
    Ok(())
}
