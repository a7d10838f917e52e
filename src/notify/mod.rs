//! Notification jobs and the queue seam they are handed to.
//!
//! Enqueueing is best-effort: the thread event log is the source of truth
//! for "has this already fired", so a lost job is never re-sent from here.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::model::Sentiment;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    New,
    Threshold,
    SentimentShift,
}

impl NotificationType {
    /// Queue job name, as consumed by the delivery workers.
    pub fn job_name(&self) -> &'static str {
        match self {
            NotificationType::New => "topic-new",
            NotificationType::Threshold => "topic-threshold",
            NotificationType::SentimentShift => "topic-sentiment-shift",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationJob {
    pub topic_thread_id: String,
    pub client_id: String,
    pub event_type: NotificationType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_sentiment: Option<Sentiment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_sentiment: Option<Sentiment>,
}

#[async_trait]
pub trait NotificationQueue: Send + Sync {
    async fn enqueue(&self, job: NotificationJob) -> Result<()>;
}

/// Collects jobs in memory; handy for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryQueue {
    jobs: Mutex<Vec<NotificationJob>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn jobs(&self) -> Vec<NotificationJob> {
        self.jobs.lock().clone()
    }

    pub fn drain(&self) -> Vec<NotificationJob> {
        std::mem::take(&mut *self.jobs.lock())
    }
}

#[async_trait]
impl NotificationQueue for MemoryQueue {
    async fn enqueue(&self, job: NotificationJob) -> Result<()> {
        self.jobs.lock().push(job);
        Ok(())
    }
}

/// Forwards jobs to an in-process consumer task.
#[derive(Debug, Clone)]
pub struct ChannelQueue {
    tx: mpsc::UnboundedSender<NotificationJob>,
}

impl ChannelQueue {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<NotificationJob>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl NotificationQueue for ChannelQueue {
    async fn enqueue(&self, job: NotificationJob) -> Result<()> {
        self.tx
            .send(job)
            .map_err(|_| anyhow!("notification consumer has shut down"))
    }
}
