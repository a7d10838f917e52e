//! Relational store seams.
//!
//! The engine only talks to storage through these traits; `memory::MemoryStore`
//! implements all of them for tests, the demo and database-less embedders.
//! Implementations are expected to apply their own query timeouts.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::model::{Client, ItemKind, MentionItem, ThreadEvent, ThreadEventKind, TopicThread};

pub use memory::MemoryStore;

#[async_trait]
pub trait MentionStore: Send + Sync {
    async fn item(&self, kind: ItemKind, id: &str) -> Result<Option<MentionItem>>;

    /// Most recent root items (no parent) of a client created at or after
    /// `since`, newest first, at most `limit`.
    async fn recent_roots(
        &self,
        client_id: &str,
        since: DateTime<Utc>,
        limit: usize,
        exclude_id: Option<&str>,
    ) -> Result<Vec<MentionItem>>;

    async fn set_cluster_parent(
        &self,
        kind: ItemKind,
        id: &str,
        parent_id: &str,
        score: f32,
    ) -> Result<()>;

    async fn set_item_thread(&self, kind: ItemKind, id: &str, thread_id: &str) -> Result<()>;

    /// All items (mentions and social) currently linked to a thread.
    async fn items_for_thread(&self, thread_id: &str) -> Result<Vec<MentionItem>>;
}

#[async_trait]
pub trait ThreadStore: Send + Sync {
    async fn active_thread(
        &self,
        client_id: &str,
        normalized_name: &str,
    ) -> Result<Option<TopicThread>>;

    /// Most recently closed thread for the key that closed at or after `closed_since`.
    async fn reopenable_thread(
        &self,
        client_id: &str,
        normalized_name: &str,
        closed_since: DateTime<Utc>,
    ) -> Result<Option<TopicThread>>;

    async fn thread(&self, id: &str) -> Result<Option<TopicThread>>;

    async fn insert_thread(&self, thread: &TopicThread) -> Result<()>;

    async fn save_thread(&self, thread: &TopicThread) -> Result<()>;

    /// ACTIVE threads whose last item arrived strictly before `cutoff`.
    async fn active_threads_idle_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<TopicThread>>;

    async fn append_event(&self, event: &ThreadEvent) -> Result<()>;

    async fn events_for_thread(&self, thread_id: &str) -> Result<Vec<ThreadEvent>>;

    async fn count_client_events_since(
        &self,
        client_id: &str,
        kind: ThreadEventKind,
        since: DateTime<Utc>,
    ) -> Result<usize>;
}

#[async_trait]
pub trait SovStore: Send + Sync {
    async fn client(&self, id: &str) -> Result<Option<Client>>;

    /// Declared competitor names of a client.
    async fn competitor_names(&self, client_id: &str) -> Result<Vec<String>>;

    /// Active clients of a tenant.
    async fn org_clients(&self, org_id: &str) -> Result<Vec<Client>>;

    /// Source identifiers of the client's mentions created in `[from, to]`.
    async fn client_item_sources(
        &self,
        client_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<String>>;

    /// Source identifiers of every mention of the tenant created in `[from, to]`.
    async fn org_item_sources(
        &self,
        org_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<String>>;

    /// Tier (1..=3) of a normalized domain, if classified.
    async fn source_tier(&self, domain: &str) -> Result<Option<u8>>;
}
