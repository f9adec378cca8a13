//! Periodic cache invalidation.
//!
//! Every interval the grid cache, the disk store and the file listing are
//! dropped, so rewritten and newly added forecast files are picked up.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast;
use tokio::time::interval;
use tracing::info;

use crate::state::AppState;

/// Statistics from one clear.
#[derive(Debug, Default, Clone, Serialize)]
pub struct CacheClearStats {
    /// Grid cache entries dropped (including memoized failures)
    pub grids_cleared: usize,
    /// Disk store entries removed
    pub disk_entries_removed: usize,
}

/// Background task clearing the caches on a fixed interval.
pub struct CacheClearTask {
    state: Arc<AppState>,
    interval: Duration,
}

impl CacheClearTask {
    pub fn new(state: Arc<AppState>) -> Self {
        let interval = state.config.cache_clear_interval;
        Self { state, interval }
    }

    /// Clear everything once.
    pub async fn run_once(&self) -> CacheClearStats {
        let grids_cleared = self.state.grid_cache.clear().await;
        let disk_entries_removed = self.state.grid_cache.purge_disk().await;
        self.state.catalog.invalidate().await;

        let stats = CacheClearStats {
            grids_cleared,
            disk_entries_removed,
        };
        info!(
            grids = stats.grids_cleared,
            disk_entries = stats.disk_entries_removed,
            "Cache clear complete"
        );
        stats
    }

    /// Run until `shutdown` fires. The first clear happens one interval
    /// after start.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Starting cache clear background task"
        );

        let mut ticker = interval(self.interval);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Stopping cache clear task");
                    break;
                }
                _ = ticker.tick() => {
                    self.run_once().await;
                }
            }
        }
    }
}
