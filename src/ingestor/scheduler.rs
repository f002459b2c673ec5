//! Periodic catalog sync
//!
//! Wakes on a cron schedule (seconds field included, as accepted by the
//! `cron` crate) and syncs every active playlist.

use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use cron::Schedule;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::CatalogSyncService;
use crate::errors::{AppError, AppResult};

pub struct SyncScheduler {
    schedule: Schedule,
    sync: Arc<CatalogSyncService>,
    cancellation: CancellationToken,
}

impl SyncScheduler {
    pub fn new(
        expression: &str,
        sync: Arc<CatalogSyncService>,
        cancellation: CancellationToken,
    ) -> AppResult<Self> {
        let schedule = Schedule::from_str(expression).map_err(|e| {
            AppError::configuration(format!("Invalid sync cron '{expression}': {e}"))
        })?;
        Ok(Self {
            schedule,
            sync,
            cancellation,
        })
    }

    /// Run until cancelled.
    pub async fn start(self) {
        info!("Sync scheduler started");
        loop {
            let Some(next_time) = self.schedule.upcoming(Utc).next() else {
                info!("Sync schedule has no upcoming runs, stopping scheduler");
                return;
            };
            let sleep_duration = next_time
                .signed_duration_since(Utc::now())
                .to_std()
                .unwrap_or_default();
            debug!("Next scheduled sync at {}", next_time);

            tokio::select! {
                _ = self.cancellation.cancelled() => {
                    info!("Sync scheduler stopped");
                    return;
                }
                _ = tokio::time::sleep(sleep_duration) => {
                    match self.sync.sync_all_active().await {
                        Ok(count) => info!("Scheduled sync finished: {} playlists synced", count),
                        Err(e) => error!("Scheduled sync failed: {}", e),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UpstreamConfig;
    use crate::repositories::InMemoryCatalogStore;
    use crate::utils::StandardHttpClient;
    use std::time::Duration;

    fn service() -> Arc<CatalogSyncService> {
        Arc::new(CatalogSyncService::new(
            Arc::new(InMemoryCatalogStore::new()),
            StandardHttpClient::with_connection_timeout(Duration::from_secs(1)).unwrap(),
            UpstreamConfig::default(),
        ))
    }

    #[test]
    fn rejects_invalid_expression() {
        let err = SyncScheduler::new("every hour", service(), CancellationToken::new())
            .err()
            .unwrap();
        assert!(matches!(err, AppError::Configuration { .. }));
    }

    #[tokio::test]
    async fn stops_when_cancelled() {
        let token = CancellationToken::new();
        let scheduler = SyncScheduler::new("0 0 3 * * *", service(), token.clone()).unwrap();
        let handle = tokio::spawn(scheduler.start());
        token.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
