// src/maintenance.rs
use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, gauge};
use tokio::task::JoinHandle;

use crate::cluster::ClusterCache;
use crate::config::MaintenanceConfig;
use crate::threads::ThreadManager;

/// Periodically close threads idle past the inactivity window.
/// Store failures are logged and retried on the next tick.
pub fn spawn_close_inactive(manager: Arc<ThreadManager>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            match manager.close_inactive().await {
                Ok(closed) => {
                    counter!("maintenance_runs_total", "job" => "close_inactive").increment(1);
                    tracing::info!(target: "maintenance", closed, "close-inactive tick");
                }
                Err(e) => {
                    tracing::warn!(target: "maintenance", error = %e, "close-inactive tick failed");
                }
            }
        }
    })
}

/// Periodically drop expired cluster cache entries.
pub fn spawn_cache_cleanup(cache: Arc<dyn ClusterCache>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            let removed = cache.cleanup();
            counter!("maintenance_runs_total", "job" => "cache_cleanup").increment(1);
            gauge!("cluster_cache_entries").set(cache.len() as f64);
            tracing::debug!(target: "maintenance", removed, remaining = cache.len(), "cache cleanup tick");
        }
    })
}

/// Spawn both loops with the configured intervals.
pub fn spawn_all(
    cfg: &MaintenanceConfig,
    manager: Arc<ThreadManager>,
    cache: Arc<dyn ClusterCache>,
) -> Vec<JoinHandle<()>> {
    vec![
        spawn_close_inactive(
            manager,
            Duration::from_secs(cfg.close_inactive_interval_secs.max(1)),
        ),
        spawn_cache_cleanup(
            cache,
            Duration::from_secs(cfg.cache_cleanup_interval_secs.max(1)),
        ),
    ]
}
