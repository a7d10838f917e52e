//! # Domain model
//! Items produced by the analysis pipeline, topic threads and their event log.
//!
//! Mentions (press) and social posts are handled uniformly; `ItemKind` only
//! decides which counter an item feeds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Sentiment class assigned upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
    Mixed,
}

impl Sentiment {
    /// Tie-break precedence used when two classes share the highest count.
    pub const PRECEDENCE: [Sentiment; 4] = [
        Sentiment::Positive,
        Sentiment::Negative,
        Sentiment::Mixed,
        Sentiment::Neutral,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "POSITIVE",
            Sentiment::Negative => "NEGATIVE",
            Sentiment::Neutral => "NEUTRAL",
            Sentiment::Mixed => "MIXED",
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Mention,
    Social,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Mention => "mention",
            ItemKind::Social => "social",
        }
    }
}

/// Analyzed mention or social post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MentionItem {
    pub id: String,
    pub kind: ItemKind,
    pub client_id: String,
    pub title: String,
    #[serde(default)]
    pub summary: Option<String>,
    pub sentiment: Sentiment,
    /// Outlet domain for mentions, author handle for social posts.
    pub source: String,
    pub published_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub cluster_score: Option<f32>,
    #[serde(default)]
    pub topic_thread_id: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
}

impl MentionItem {
    /// A root item has no cluster parent of its own.
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Counts per sentiment class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentimentBreakdown {
    pub positive: u32,
    pub negative: u32,
    pub neutral: u32,
    pub mixed: u32,
}

impl SentimentBreakdown {
    pub fn record(&mut self, s: Sentiment) {
        match s {
            Sentiment::Positive => self.positive += 1,
            Sentiment::Negative => self.negative += 1,
            Sentiment::Neutral => self.neutral += 1,
            Sentiment::Mixed => self.mixed += 1,
        }
    }

    pub fn get(&self, s: Sentiment) -> u32 {
        match s {
            Sentiment::Positive => self.positive,
            Sentiment::Negative => self.negative,
            Sentiment::Neutral => self.neutral,
            Sentiment::Mixed => self.mixed,
        }
    }

    pub fn total(&self) -> u32 {
        self.positive + self.negative + self.neutral + self.mixed
    }

    /// Class with the strictly highest count; ties resolved by
    /// `Sentiment::PRECEDENCE`, NEUTRAL when empty.
    pub fn dominant(&self) -> Sentiment {
        if self.total() == 0 {
            return Sentiment::Neutral;
        }
        let mut best = Sentiment::PRECEDENCE[0];
        for s in Sentiment::PRECEDENCE.iter().copied().skip(1) {
            if self.get(s) > self.get(best) {
                best = s;
            }
        }
        best
    }
}

/// Lifecycle status of a topic thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "UPPERCASE")]
pub enum ThreadStatus {
    Active,
    Closed {
        #[serde(rename = "closedAt")]
        closed_at: DateTime<Utc>,
    },
}

impl ThreadStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, ThreadStatus::Active)
    }

    pub fn closed_at(&self) -> Option<DateTime<Utc>> {
        match self {
            ThreadStatus::Active => None,
            ThreadStatus::Closed { closed_at } => Some(*closed_at),
        }
    }
}

/// Long-lived per-client aggregate for one normalized topic name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicThread {
    pub id: String,
    pub client_id: String,
    pub name: String,
    pub normalized_name: String,
    #[serde(flatten)]
    pub status: ThreadStatus,
    pub mention_count: u32,
    pub social_mention_count: u32,
    pub dominant_sentiment: Sentiment,
    pub sentiment_breakdown: SentimentBreakdown,
    pub top_sources: Vec<String>,
    pub first_seen_at: DateTime<Utc>,
    pub last_mention_at: DateTime<Utc>,
    pub thresholds_reached: Vec<u32>,
    pub last_notified_at: Option<DateTime<Utc>>,
}

impl TopicThread {
    pub fn total_count(&self) -> u32 {
        self.mention_count + self.social_mention_count
    }

    pub fn bump(&mut self, kind: ItemKind, now: DateTime<Utc>) {
        match kind {
            ItemKind::Mention => self.mention_count += 1,
            ItemKind::Social => self.social_mention_count += 1,
        }
        self.last_mention_at = now;
    }
}

/// Lowercased, trimmed topic label; the dedup key inside a client.
pub fn normalize_topic(topic: &str) -> String {
    topic.trim().to_lowercase()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThreadEventKind {
    Created,
    MentionAdded,
    TopicNew,
    ThresholdReached,
    SentimentShift,
    Closed,
    Reopened,
}

impl ThreadEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThreadEventKind::Created => "CREATED",
            ThreadEventKind::MentionAdded => "MENTION_ADDED",
            ThreadEventKind::TopicNew => "TOPIC_NEW",
            ThreadEventKind::ThresholdReached => "THRESHOLD_REACHED",
            ThreadEventKind::SentimentShift => "SENTIMENT_SHIFT",
            ThreadEventKind::Closed => "CLOSED",
            ThreadEventKind::Reopened => "REOPENED",
        }
    }
}

/// Immutable append-only log row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadEvent {
    pub id: String,
    pub topic_thread_id: String,
    pub client_id: String,
    pub kind: ThreadEventKind,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}

/// Tenant-scoped client record used by share of voice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub id: String,
    pub org_id: String,
    pub name: String,
    pub active: bool,
}
