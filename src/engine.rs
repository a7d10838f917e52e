//! # Signals Engine
//! Wires the cluster resolver, thread manager and share-of-voice aggregator
//! over one store, and runs the per-item pipeline:
//! analyzed item → cluster parent → topic thread.

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::cluster::{build_comparator, ClusterCache, ClusterMatch, ClusterResolver, DynComparator, TtlCache};
use crate::config::EngineConfig;
use crate::maintenance;
use crate::model::{ItemKind, MentionItem};
use crate::notify::NotificationQueue;
use crate::sov::SovAggregator;
use crate::store::{MentionStore, SovStore, ThreadStore};
use crate::threads::{Assignment, ThreadManager};

/// What happened to one item.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemOutcome {
    /// Only mentions are clustered; social items carry `None`.
    pub cluster: Option<ClusterMatch>,
    pub thread: Option<Assignment>,
}

pub struct SignalsEngine {
    cfg: EngineConfig,
    items: Arc<dyn MentionStore>,
    pub resolver: Arc<ClusterResolver>,
    pub threads: Arc<ThreadManager>,
    pub sov: Arc<SovAggregator>,
}

impl SignalsEngine {
    /// Build with the comparator described by `cfg.comparator`.
    pub fn new<S>(cfg: EngineConfig, store: Arc<S>, queue: Arc<dyn NotificationQueue>) -> Result<Self>
    where
        S: MentionStore + ThreadStore + SovStore + 'static,
    {
        let comparator = build_comparator(&cfg.comparator)?;
        Ok(Self::with_comparator(cfg, store, queue, comparator))
    }

    pub fn with_comparator<S>(
        cfg: EngineConfig,
        store: Arc<S>,
        queue: Arc<dyn NotificationQueue>,
        comparator: DynComparator,
    ) -> Self
    where
        S: MentionStore + ThreadStore + SovStore + 'static,
    {
        let items: Arc<dyn MentionStore> = store.clone();
        let thread_store: Arc<dyn ThreadStore> = store.clone();
        let sov_store: Arc<dyn SovStore> = store;

        let cache: Arc<dyn ClusterCache> = Arc::new(TtlCache::new(
            cfg.cluster.cache_capacity,
            cfg.cluster.cache_ttl(),
        ));
        let resolver = ClusterResolver::new(items.clone(), comparator, cache, cfg.cluster.clone());
        let threads = ThreadManager::new(items.clone(), thread_store, queue, cfg.threads.clone());
        let sov = SovAggregator::new(sov_store, cfg.sov.clone());

        Self {
            cfg,
            items,
            resolver: Arc::new(resolver),
            threads: Arc::new(threads),
            sov: Arc::new(sov),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.cfg
    }

    /// Job entry: load the item by `(kind, id)` and process it.
    pub async fn process(&self, kind: ItemKind, id: &str) -> Result<Option<ItemOutcome>> {
        match self.items.item(kind, id).await? {
            Some(item) => self.process_item_at(&item, Utc::now()).await.map(Some),
            None => {
                debug!(target: "threads", kind = kind.as_str(), %id, "nothing to process");
                Ok(None)
            }
        }
    }

    /// A clustering failure degrades to "no parent" so the item still
    /// reaches its thread. Thread errors propagate.
    pub async fn process_item_at(&self, item: &MentionItem, now: DateTime<Utc>) -> Result<ItemOutcome> {
        let cluster = match item.kind {
            ItemKind::Mention => Some(match self.resolver.attach_at(item, now).await {
                Ok(m) => m,
                Err(e) => {
                    warn!(target: "clustering", item = %item.id, error = %e, "clustering failed, treating as no match");
                    ClusterMatch::none()
                }
            }),
            ItemKind::Social => None,
        };
        let thread = self.threads.assign_item_at(item, now).await?;
        Ok(ItemOutcome { cluster, thread })
    }

    /// Spawn the close-inactive sweep and cache cleanup loops.
    pub fn spawn_maintenance(&self) -> Vec<JoinHandle<()>> {
        maintenance::spawn_all(
            &self.cfg.maintenance,
            self.threads.clone(),
            self.resolver.cache().clone(),
        )
    }
}
