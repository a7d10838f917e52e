//! # Thread Lifecycle Manager
//! Assigns analyzed items to topic threads, recomputes aggregates, and acts on
//! the signals decided in `decide`.
//!
//! Assignments for the same `(client, normalized topic)` are serialized with an
//! in-process per-key lock. Cross-process races remain possible; the full
//! recomputation on every assignment converges counts on the next item.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveTime, Utc};
use metrics::counter;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::decide::{self, NotificationContext, ThreadSignal, ThreadStats};
use super::state;
use crate::config::ThreadConfig;
use crate::error::TransitionError;
use crate::metrics::ensure_metrics_described;
use crate::model::{
    normalize_topic, ItemKind, MentionItem, Sentiment, SentimentBreakdown, ThreadEvent, ThreadEventKind,
    TopicThread,
};
use crate::notify::{NotificationJob, NotificationQueue, NotificationType};
use crate::store::{MentionStore, ThreadStore};

/// How an item reached its thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AssignOutcome {
    Joined,
    Reopened,
    Created,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub thread_id: String,
    pub outcome: AssignOutcome,
    pub signals: Vec<ThreadSignal>,
}

type KeyLock = Arc<tokio::sync::Mutex<()>>;

const KEY_LOCK_PRUNE_AT: usize = 1024;

pub struct ThreadManager {
    items: Arc<dyn MentionStore>,
    threads: Arc<dyn ThreadStore>,
    queue: Arc<dyn NotificationQueue>,
    cfg: ThreadConfig,
    key_locks: parking_lot::Mutex<HashMap<String, KeyLock>>,
}

impl ThreadManager {
    pub fn new(
        items: Arc<dyn MentionStore>,
        threads: Arc<dyn ThreadStore>,
        queue: Arc<dyn NotificationQueue>,
        cfg: ThreadConfig,
    ) -> Self {
        ensure_metrics_described();
        Self {
            items,
            threads,
            queue,
            cfg,
            key_locks: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &ThreadConfig {
        &self.cfg
    }

    /// Job entry: load the item and assign it. `None` for unknown items or
    /// items without topic/client.
    pub async fn assign(&self, kind: ItemKind, id: &str) -> Result<Option<Assignment>> {
        let Some(item) = self.items.item(kind, id).await? else {
            debug!(target: "threads", kind = kind.as_str(), %id, "item not found");
            return Ok(None);
        };
        self.assign_item_at(&item, Utc::now()).await
    }

    pub async fn assign_item(&self, item: &MentionItem) -> Result<Option<Assignment>> {
        self.assign_item_at(item, Utc::now()).await
    }

    pub async fn assign_item_at(
        &self,
        item: &MentionItem,
        now: DateTime<Utc>,
    ) -> Result<Option<Assignment>> {
        let topic = match item.topic.as_deref().map(str::trim) {
            Some(t) if !t.is_empty() => t,
            _ => return Ok(None),
        };
        if item.client_id.trim().is_empty() {
            return Ok(None);
        }
        let normalized = normalize_topic(topic);

        let lock = self.key_lock(&format!("{}:{}", item.client_id, normalized));
        let _guard = lock.lock().await;

        let (mut thread, outcome, previous_dominant) =
            match self.threads.active_thread(&item.client_id, &normalized).await? {
                Some(mut t) => {
                    let prev = t.dominant_sentiment;
                    t.bump(item.kind, now);
                    self.threads.save_thread(&t).await?;
                    self.items.set_item_thread(item.kind, &item.id, &t.id).await?;
                    self.log_event(
                        &t,
                        ThreadEventKind::MentionAdded,
                        json!({
                            "itemId": item.id,
                            "itemKind": item.kind.as_str(),
                            "sentiment": item.sentiment,
                            "source": item.source,
                        }),
                        now,
                    )
                    .await?;
                    (t, AssignOutcome::Joined, Some(prev))
                }
                None => {
                    let closed_since = now - self.cfg.reopen_window();
                    match self
                        .threads
                        .reopenable_thread(&item.client_id, &normalized, closed_since)
                        .await?
                    {
                        Some(t) => (self.reopen(t, item, now).await?, AssignOutcome::Reopened, None),
                        None => (self.create(item, topic, &normalized, now).await?, AssignOutcome::Created, None),
                    }
                }
            };

        let stats = self.recalculate_thread(&mut thread).await?;

        let signals = self
            .evaluate_and_apply(&mut thread, item, previous_dominant, now)
            .await?;

        info!(
            target: "threads",
            thread = %thread.id, outcome = ?outcome, total = stats.total(),
            dominant = %thread.dominant_sentiment, signals = signals.len(),
            "item assigned"
        );

        Ok(Some(Assignment {
            thread_id: thread.id,
            outcome,
            signals,
        }))
    }

    async fn reopen(
        &self,
        mut t: TopicThread,
        item: &MentionItem,
        now: DateTime<Utc>,
    ) -> Result<TopicThread> {
        let (status, kind) = state::reopen(&t.status, now, self.cfg.reopen_window())?;
        t.status = status;
        t.bump(item.kind, now);
        self.threads.save_thread(&t).await?;
        self.items.set_item_thread(item.kind, &item.id, &t.id).await?;
        self.log_event(
            &t,
            kind,
            json!({ "itemId": item.id, "itemKind": item.kind.as_str() }),
            now,
        )
        .await?;
        Ok(t)
    }

    async fn create(
        &self,
        item: &MentionItem,
        topic: &str,
        normalized: &str,
        now: DateTime<Utc>,
    ) -> Result<TopicThread> {
        let (status, kind) = state::activate();
        let mut breakdown = SentimentBreakdown::default();
        breakdown.record(item.sentiment);
        let (mention_count, social_mention_count) = match item.kind {
            ItemKind::Mention => (1, 0),
            ItemKind::Social => (0, 1),
        };
        let t = TopicThread {
            id: Uuid::new_v4().to_string(),
            client_id: item.client_id.clone(),
            name: topic.to_string(),
            normalized_name: normalized.to_string(),
            status,
            mention_count,
            social_mention_count,
            dominant_sentiment: item.sentiment,
            sentiment_breakdown: breakdown,
            top_sources: if item.source.trim().is_empty() {
                vec![]
            } else {
                vec![item.source.trim().to_string()]
            },
            first_seen_at: now,
            last_mention_at: now,
            thresholds_reached: vec![],
            last_notified_at: None,
        };
        self.threads.insert_thread(&t).await?;
        self.items.set_item_thread(item.kind, &item.id, &t.id).await?;
        self.log_event(
            &t,
            kind,
            json!({ "itemId": item.id, "itemKind": item.kind.as_str(), "topic": topic }),
            now,
        )
        .await?;
        Ok(t)
    }

    /// Recompute a thread's aggregates from every linked item and persist them.
    pub async fn recalculate(&self, thread_id: &str) -> Result<Option<ThreadStats>> {
        let Some(mut thread) = self.threads.thread(thread_id).await? else {
            return Ok(None);
        };
        self.recalculate_thread(&mut thread).await.map(Some)
    }

    async fn recalculate_thread(&self, thread: &mut TopicThread) -> Result<ThreadStats> {
        let linked = self
            .items
            .items_for_thread(&thread.id)
            .await
            .with_context(|| format!("loading items of thread {}", thread.id))?;
        let stats = decide::recalculate(&linked, self.cfg.top_sources_cap);
        stats.apply_to(thread);
        self.threads.save_thread(thread).await?;
        Ok(stats)
    }

    async fn evaluate_and_apply(
        &self,
        thread: &mut TopicThread,
        item: &MentionItem,
        previous_dominant: Option<Sentiment>,
        now: DateTime<Utc>,
    ) -> Result<Vec<ThreadSignal>> {
        // Only the new-topic rule needs the event log; skip the reads otherwise.
        let (topic_new_fired, created_today) = if thread.total_count() == 2 {
            let fired = self
                .threads
                .events_for_thread(&thread.id)
                .await?
                .iter()
                .any(|e| e.kind == ThreadEventKind::TopicNew);
            let start_of_day = now.date_naive().and_time(NaiveTime::MIN).and_utc();
            let created = self
                .threads
                .count_client_events_since(&thread.client_id, ThreadEventKind::Created, start_of_day)
                .await?;
            (fired, created)
        } else {
            (false, 0)
        };

        let ctx = NotificationContext {
            previous_dominant,
            topic_new_fired,
            created_today,
            now,
        };
        let decision = decide::evaluate(thread, &ctx, &self.cfg);

        for s in &decision.suppressed {
            counter!("thread_notifications_suppressed_total", "reason" => s.reason).increment(1);
            debug!(target: "threads", thread = %thread.id, signal = ?s.signal, reason = s.reason, "suppressed");
        }
        if decision.signals.is_empty() {
            return Ok(vec![]);
        }

        // Persist bookkeeping first, then the log, then best-effort enqueue.
        for sig in &decision.signals {
            match *sig {
                ThreadSignal::ThresholdReached { threshold, .. } => {
                    thread.thresholds_reached.push(threshold)
                }
                ThreadSignal::SentimentShift { .. } => thread.last_notified_at = Some(now),
                ThreadSignal::TopicNew { .. } => {}
            }
        }
        self.threads.save_thread(thread).await?;

        for sig in &decision.signals {
            let (kind, payload, job) = signal_parts(thread, item, *sig);
            self.log_event(thread, kind, payload, now).await?;
            if let Err(e) = self.queue.enqueue(job).await {
                warn!(target: "threads", thread = %thread.id, error = %e, "enqueue failed");
            }
        }

        Ok(decision.signals)
    }

    /// Close every ACTIVE thread idle for longer than the inactivity window.
    pub async fn close_inactive(&self) -> Result<usize> {
        self.close_inactive_at(Utc::now()).await
    }

    pub async fn close_inactive_at(&self, now: DateTime<Utc>) -> Result<usize> {
        let cutoff = now - self.cfg.inactivity();
        let idle = self.threads.active_threads_idle_since(cutoff).await?;
        let mut closed = 0usize;
        for mut t in idle {
            let (status, kind) = match state::close(&t.status, now) {
                Ok(v) => v,
                Err(TransitionError::AlreadyClosed) => continue,
                Err(e) => return Err(e.into()),
            };
            t.status = status;
            self.threads.save_thread(&t).await?;
            self.log_event(
                &t,
                kind,
                json!({ "reason": "inactivity", "cutoffHours": self.cfg.inactivity_hours }),
                now,
            )
            .await?;
            closed += 1;
        }
        if closed > 0 {
            counter!("threads_closed_total").increment(closed as u64);
            info!(target: "threads", closed, "closed inactive threads");
        }
        Ok(closed)
    }

    /// Assign a batch in chronological order, each at its publication time.
    pub async fn backfill(&self, mut items: Vec<MentionItem>) -> Result<usize> {
        items.sort_by_key(|i| i.published_at);
        let mut assigned = 0usize;
        for it in &items {
            if self.assign_item_at(it, it.published_at).await?.is_some() {
                assigned += 1;
            }
        }
        info!(target: "threads", assigned, total = items.len(), "backfill finished");
        Ok(assigned)
    }

    async fn log_event(
        &self,
        thread: &TopicThread,
        kind: ThreadEventKind,
        payload: Value,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let ev = ThreadEvent {
            id: Uuid::new_v4().to_string(),
            topic_thread_id: thread.id.clone(),
            client_id: thread.client_id.clone(),
            kind,
            payload,
            created_at: now,
        };
        self.threads.append_event(&ev).await?;
        counter!("thread_events_total", "kind" => kind.as_str()).increment(1);
        Ok(())
    }

    fn key_lock(&self, key: &str) -> KeyLock {
        let mut g = self.key_locks.lock();
        if g.len() >= KEY_LOCK_PRUNE_AT {
            g.retain(|_, l| Arc::strong_count(l) > 1);
        }
        g.entry(key.to_string()).or_default().clone()
    }
}

/// Event kind, log payload and queue job for a fired signal.
fn signal_parts(
    thread: &TopicThread,
    item: &MentionItem,
    sig: ThreadSignal,
) -> (ThreadEventKind, Value, NotificationJob) {
    let mut job = NotificationJob {
        topic_thread_id: thread.id.clone(),
        client_id: thread.client_id.clone(),
        event_type: NotificationType::New,
        threshold: None,
        old_sentiment: None,
        new_sentiment: None,
    };
    match sig {
        ThreadSignal::TopicNew { total } => (
            ThreadEventKind::TopicNew,
            json!({ "totalCount": total }),
            job,
        ),
        ThreadSignal::ThresholdReached { threshold, total } => {
            job.event_type = NotificationType::Threshold;
            job.threshold = Some(threshold);
            (
                ThreadEventKind::ThresholdReached,
                json!({ "threshold": threshold, "totalCount": total }),
                job,
            )
        }
        ThreadSignal::SentimentShift { from, to } => {
            job.event_type = NotificationType::SentimentShift;
            job.old_sentiment = Some(from);
            job.new_sentiment = Some(to);
            (
                ThreadEventKind::SentimentShift,
                json!({
                    "oldSentiment": from,
                    "newSentiment": to,
                    "itemId": item.id,
                    "itemKind": item.kind.as_str(),
                }),
                job,
            )
        }
    }
}
