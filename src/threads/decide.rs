//! # Thread decisions
//! Pure, testable logic: aggregate stats from linked items and decide which
//! notification-worthy signals an assignment produced. No I/O; the manager
//! persists and enqueues whatever comes out of here.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;

use super::cooldown::Cooldown;
use crate::config::ThreadConfig;
use crate::model::{ItemKind, MentionItem, Sentiment, SentimentBreakdown, TopicThread};

/// Aggregates recomputed from every item linked to a thread.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThreadStats {
    pub mention_count: u32,
    pub social_mention_count: u32,
    pub breakdown: SentimentBreakdown,
    pub dominant: Sentiment,
    pub top_sources: Vec<String>,
}

impl ThreadStats {
    pub fn total(&self) -> u32 {
        self.mention_count + self.social_mention_count
    }

    /// Overwrite the aggregate fields of `thread`.
    pub fn apply_to(&self, thread: &mut TopicThread) {
        thread.mention_count = self.mention_count;
        thread.social_mention_count = self.social_mention_count;
        thread.sentiment_breakdown = self.breakdown;
        thread.dominant_sentiment = self.dominant;
        thread.top_sources = self.top_sources.clone();
    }
}

/// Full recomputation. Top sources are the first `top_sources_cap` distinct
/// sources in link order, oldest first. Ties keep store order.
pub fn recalculate(items: &[MentionItem], top_sources_cap: usize) -> ThreadStats {
    let mut breakdown = SentimentBreakdown::default();
    let mut mention_count = 0u32;
    let mut social_mention_count = 0u32;

    for it in items {
        breakdown.record(it.sentiment);
        match it.kind {
            ItemKind::Mention => mention_count += 1,
            ItemKind::Social => social_mention_count += 1,
        }
    }

    let mut linked: Vec<&MentionItem> = items.iter().collect();
    linked.sort_by_key(|it| it.published_at);

    let mut seen = HashSet::new();
    let mut top_sources = Vec::new();
    for it in linked {
        if top_sources.len() >= top_sources_cap {
            break;
        }
        let src = it.source.trim();
        if src.is_empty() || !seen.insert(src.to_lowercase()) {
            continue;
        }
        top_sources.push(src.to_string());
    }

    ThreadStats {
        mention_count,
        social_mention_count,
        breakdown,
        dominant: breakdown.dominant(),
        top_sources,
    }
}

/// Notification-worthy outcome of one assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThreadSignal {
    TopicNew { total: u32 },
    ThresholdReached { threshold: u32, total: u32 },
    SentimentShift { from: Sentiment, to: Sentiment },
}

/// Signal that qualified but was held back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Suppressed {
    pub signal: ThreadSignal,
    pub reason: &'static str,
}

/// Facts the decision needs beyond the recomputed thread.
#[derive(Debug, Clone, Copy)]
pub struct NotificationContext {
    /// Dominant sentiment before this assignment; `None` for created or
    /// reopened threads.
    pub previous_dominant: Option<Sentiment>,
    /// A new-topic notification already exists for this thread.
    pub topic_new_fired: bool,
    /// CREATED events of the client since start of the current day.
    pub created_today: usize,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Decision {
    pub signals: Vec<ThreadSignal>,
    pub suppressed: Vec<Suppressed>,
}

/// Decide which signals fire for `thread` (already recomputed).
pub fn evaluate(thread: &TopicThread, ctx: &NotificationContext, cfg: &ThreadConfig) -> Decision {
    let mut out = Decision::default();
    let total = thread.total_count();

    // New topic: the second item ever linked
    if total == 2 && !ctx.topic_new_fired {
        let sig = ThreadSignal::TopicNew { total };
        if ctx.created_today < cfg.daily_new_topic_cap {
            out.signals.push(sig);
        } else {
            out.suppressed.push(Suppressed {
                signal: sig,
                reason: "daily_cap",
            });
        }
    }

    // Threshold: lowest newly crossed only
    if let Some(&threshold) = cfg
        .thresholds
        .iter()
        .find(|&&t| total >= t && !thread.thresholds_reached.contains(&t))
    {
        out.signals
            .push(ThreadSignal::ThresholdReached { threshold, total });
    }

    // Sentiment shift against the pre-assignment dominant sentiment
    if let Some(prev) = ctx.previous_dominant {
        if prev != thread.dominant_sentiment {
            let sig = ThreadSignal::SentimentShift {
                from: prev,
                to: thread.dominant_sentiment,
            };
            if Cooldown::new(cfg.shift_cooldown()).allows(thread.last_notified_at, ctx.now) {
                out.signals.push(sig);
            } else {
                out.suppressed.push(Suppressed {
                    signal: sig,
                    reason: "cooldown",
                });
            }
        }
    }

    out
}
