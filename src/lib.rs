// src/lib.rs
// Public library surface for the demo binary and integration tests.

pub mod cluster;
pub mod config;
pub mod engine;
pub mod error;
pub mod maintenance;
pub mod metrics;
pub mod model;
pub mod notify;
pub mod similarity;
pub mod sov;
pub mod store;
pub mod threads;

// ---- Re-exports for stable public API ----
pub use crate::cluster::{ClusterMatch, ClusterResolver};
pub use crate::config::EngineConfig;
pub use crate::engine::{ItemOutcome, SignalsEngine};
pub use crate::error::{SovError, TransitionError};
pub use crate::model::{
    Client, ItemKind, MentionItem, Sentiment, SentimentBreakdown, ThreadEvent, ThreadEventKind,
    ThreadStatus, TopicThread,
};
pub use crate::notify::{NotificationJob, NotificationQueue, NotificationType};
pub use crate::sov::{SovAggregator, SovData, SovHistoryPoint, SovResult};
pub use crate::store::MemoryStore;
pub use crate::threads::{AssignOutcome, Assignment, ThreadManager};
