//! # Cluster Resolver
//! Finds the cluster parent (same real-world event) for a new item.
//!
//! Order:
//! 1) cache hit on `client:normalized title` → trusted parent
//! 2) recent same-client root items ranked by keyword overlap
//! 3) high overlap accepted outright, moderate overlap confirmed by the
//!    comparator, one candidate at a time
//!
//! Comparator failures, timeouts and unparseable verdicts count as
//! "not the same event" and never escape this module.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use metrics::counter;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::cache::{cache_key, ClusterCache};
use super::comparator::{Comparison, DynComparator};
use crate::config::ClusterConfig;
use crate::metrics::{anon_id, ensure_metrics_described};
use crate::model::MentionItem;
use crate::similarity::{keywords, normalize, similarity};
use crate::store::MentionStore;

/// Outcome of a resolution. No parent is a valid result, not an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterMatch {
    pub parent_id: Option<String>,
    pub score: f32,
}

impl ClusterMatch {
    pub fn none() -> Self {
        Self {
            parent_id: None,
            score: 0.0,
        }
    }

    fn found(parent_id: &str, score: f32) -> Self {
        Self {
            parent_id: Some(parent_id.to_string()),
            score,
        }
    }
}

#[derive(Debug, Clone)]
struct Candidate {
    item: MentionItem,
    similarity: f32,
}

pub struct ClusterResolver {
    store: Arc<dyn MentionStore>,
    comparator: DynComparator,
    cache: Arc<dyn ClusterCache>,
    cfg: ClusterConfig,
}

impl ClusterResolver {
    pub fn new(
        store: Arc<dyn MentionStore>,
        comparator: DynComparator,
        cache: Arc<dyn ClusterCache>,
        cfg: ClusterConfig,
    ) -> Self {
        ensure_metrics_described();
        Self {
            store,
            comparator,
            cache,
            cfg,
        }
    }

    pub fn cache(&self) -> &Arc<dyn ClusterCache> {
        &self.cache
    }

    /// Resolve a parent for `title` among the client's recent root items.
    pub async fn resolve(&self, client_id: &str, title: &str, summary: &str) -> Result<ClusterMatch> {
        self.resolve_at(client_id, title, summary, None, Utc::now()).await
    }

    /// Resolve and persist `parentId`/`clusterScore` on the item itself.
    /// The item is never its own candidate.
    pub async fn attach(&self, item: &MentionItem) -> Result<ClusterMatch> {
        self.attach_at(item, Utc::now()).await
    }

    pub async fn attach_at(&self, item: &MentionItem, now: DateTime<Utc>) -> Result<ClusterMatch> {
        let summary = item.summary.as_deref().unwrap_or_default();
        let m = self
            .resolve_at(&item.client_id, &item.title, summary, Some(&item.id), now)
            .await?;
        if let Some(parent) = m.parent_id.as_deref() {
            if parent != item.id {
                self.store
                    .set_cluster_parent(item.kind, &item.id, parent, m.score)
                    .await?;
            }
        }
        Ok(m)
    }

    /// Store read failures propagate; comparator failures do not.
    pub async fn resolve_at(
        &self,
        client_id: &str,
        title: &str,
        summary: &str,
        exclude_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<ClusterMatch> {
        let normalized = normalize(title);
        let key = cache_key(client_id, &normalized);
        let id = anon_id(&normalized);

        // 1) Cache
        if let Some(parent) = self.cache.get_at(&key, now) {
            if exclude_id != Some(parent.as_str()) {
                counter!("cluster_cache_hits_total").increment(1);
                counter!("cluster_matches_total", "path" => "cache").increment(1);
                debug!(target: "clustering", %id, %parent, "cache hit");
                return Ok(ClusterMatch::found(&parent, self.cfg.cache_hit_score));
            }
        }
        counter!("cluster_cache_misses_total").increment(1);

        // 2) Recent roots
        let since = now - self.cfg.lookback();
        let recent = self
            .store
            .recent_roots(client_id, since, self.cfg.candidate_limit, exclude_id)
            .await?;
        if recent.is_empty() {
            return Ok(ClusterMatch::none());
        }

        let candidates = self.rank_candidates(title, recent);
        if candidates.is_empty() {
            debug!(target: "clustering", %id, "no candidate above floor");
            return Ok(ClusterMatch::none());
        }

        // 3) Confirm in order; first acceptance wins
        for cand in candidates {
            if cand.similarity >= self.cfg.keyword_accept {
                info!(
                    target: "clustering",
                    %id, parent = %cand.item.id, similarity = cand.similarity,
                    "keyword match"
                );
                counter!("cluster_matches_total", "path" => "keyword").increment(1);
                self.cache.set_at(&key, &cand.item.id, now);
                return Ok(ClusterMatch::found(&cand.item.id, cand.similarity));
            }

            let verdict = self.confirm(title, summary, &cand.item).await;
            if verdict.same_event && verdict.confidence >= self.cfg.comparator_accept {
                info!(
                    target: "clustering",
                    %id, parent = %cand.item.id, confidence = verdict.confidence,
                    provider = self.comparator.provider_name(),
                    "comparator match"
                );
                counter!("cluster_matches_total", "path" => "comparator").increment(1);
                self.cache.set_at(&key, &cand.item.id, now);
                return Ok(ClusterMatch::found(&cand.item.id, verdict.confidence));
            }
        }

        Ok(ClusterMatch::none())
    }

    /// Candidates at or above the floor, best first, capped at `top_candidates`.
    fn rank_candidates(&self, title: &str, recent: Vec<MentionItem>) -> Vec<Candidate> {
        let new_kw = keywords(title);
        let mut out: Vec<Candidate> = recent
            .into_iter()
            .filter_map(|item| {
                let s = similarity(&new_kw, &keywords(&item.title));
                (s >= self.cfg.candidate_floor).then_some(Candidate {
                    item,
                    similarity: s,
                })
            })
            .collect();
        // stable: ties keep newest-first order from the store
        out.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        out.truncate(self.cfg.top_candidates);
        out
    }

    /// One sequential comparator call under a timeout; any failure rejects.
    async fn confirm(&self, title: &str, summary: &str, cand: &MentionItem) -> Comparison {
        counter!("cluster_comparisons_total").increment(1);
        let timeout = StdDuration::from_secs(self.cfg.comparator_timeout_secs.max(1));
        let call = self.comparator.compare(
            title,
            summary,
            &cand.title,
            cand.summary.as_deref().unwrap_or_default(),
        );
        match tokio::time::timeout(timeout, call).await {
            Ok(Ok(c)) => c,
            Ok(Err(e)) => {
                counter!("cluster_comparator_failures_total").increment(1);
                warn!(target: "clustering", error = %e, candidate = %cand.id, "comparator failed");
                Comparison::rejected()
            }
            Err(_) => {
                counter!("cluster_comparator_failures_total").increment(1);
                warn!(target: "clustering", candidate = %cand.id, "comparator timed out");
                Comparison::rejected()
            }
        }
    }
}
