//! In-memory implementation of every store trait.
//!
//! Single `RwLock` over plain collections; items keep insertion order so
//! "linked order" is the order items were added.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;

use super::{MentionStore, SovStore, ThreadStore};
use crate::model::{Client, ItemKind, MentionItem, ThreadEvent, ThreadEventKind, TopicThread};
use crate::sov::tiers::SourceTierTable;

#[derive(Debug, Default)]
struct Inner {
    items: Vec<MentionItem>,
    threads: HashMap<String, TopicThread>,
    events: Vec<ThreadEvent>,
    clients: HashMap<String, Client>,
    competitors: HashMap<String, Vec<String>>,
    tiers: SourceTierTable,
}

impl Inner {
    fn item_mut(&mut self, kind: ItemKind, id: &str) -> Result<&mut MentionItem> {
        self.items
            .iter_mut()
            .find(|m| m.kind == kind && m.id == id)
            .ok_or_else(|| anyhow!("{} {id} not found", kind.as_str()))
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tiers(tiers: SourceTierTable) -> Self {
        let store = Self::default();
        store.inner.write().tiers = tiers;
        store
    }

    /// Insert or replace an item (keyed by kind + id).
    pub fn insert_item(&self, item: MentionItem) {
        let mut g = self.inner.write();
        if let Some(slot) = g
            .items
            .iter_mut()
            .find(|m| m.kind == item.kind && m.id == item.id)
        {
            *slot = item;
        } else {
            g.items.push(item);
        }
    }

    pub fn insert_client(&self, client: Client) {
        self.inner.write().clients.insert(client.id.clone(), client);
    }

    pub fn add_competitor(&self, client_id: &str, competitor_name: &str) {
        self.inner
            .write()
            .competitors
            .entry(client_id.to_string())
            .or_default()
            .push(competitor_name.to_string());
    }

    pub fn set_source_tier(&self, domain: &str, tier: u8) {
        self.inner.write().tiers.insert(domain, tier);
    }

    /// Snapshot of one item.
    pub fn get_item(&self, kind: ItemKind, id: &str) -> Option<MentionItem> {
        self.inner
            .read()
            .items
            .iter()
            .find(|m| m.kind == kind && m.id == id)
            .cloned()
    }

    /// Snapshot of all threads of a client, oldest first.
    pub fn threads_for_client(&self, client_id: &str) -> Vec<TopicThread> {
        let g = self.inner.read();
        let mut v: Vec<TopicThread> = g
            .threads
            .values()
            .filter(|t| t.client_id == client_id)
            .cloned()
            .collect();
        v.sort_by_key(|t| t.first_seen_at);
        v
    }

    pub fn all_events(&self) -> Vec<ThreadEvent> {
        self.inner.read().events.clone()
    }
}

#[async_trait]
impl MentionStore for MemoryStore {
    async fn item(&self, kind: ItemKind, id: &str) -> Result<Option<MentionItem>> {
        Ok(self.get_item(kind, id))
    }

    async fn recent_roots(
        &self,
        client_id: &str,
        since: DateTime<Utc>,
        limit: usize,
        exclude_id: Option<&str>,
    ) -> Result<Vec<MentionItem>> {
        let g = self.inner.read();
        let mut v: Vec<MentionItem> = g
            .items
            .iter()
            .filter(|m| m.client_id == client_id && m.is_root() && m.created_at >= since)
            .filter(|m| exclude_id != Some(m.id.as_str()))
            .cloned()
            .collect();
        v.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        v.truncate(limit);
        Ok(v)
    }

    async fn set_cluster_parent(
        &self,
        kind: ItemKind,
        id: &str,
        parent_id: &str,
        score: f32,
    ) -> Result<()> {
        let mut g = self.inner.write();
        let item = g.item_mut(kind, id)?;
        item.parent_id = Some(parent_id.to_string());
        item.cluster_score = Some(score);
        Ok(())
    }

    async fn set_item_thread(&self, kind: ItemKind, id: &str, thread_id: &str) -> Result<()> {
        let mut g = self.inner.write();
        g.item_mut(kind, id)?.topic_thread_id = Some(thread_id.to_string());
        Ok(())
    }

    async fn items_for_thread(&self, thread_id: &str) -> Result<Vec<MentionItem>> {
        let g = self.inner.read();
        Ok(g.items
            .iter()
            .filter(|m| m.topic_thread_id.as_deref() == Some(thread_id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ThreadStore for MemoryStore {
    async fn active_thread(
        &self,
        client_id: &str,
        normalized_name: &str,
    ) -> Result<Option<TopicThread>> {
        let g = self.inner.read();
        Ok(g.threads
            .values()
            .find(|t| {
                t.client_id == client_id
                    && t.normalized_name == normalized_name
                    && t.status.is_active()
            })
            .cloned())
    }

    async fn reopenable_thread(
        &self,
        client_id: &str,
        normalized_name: &str,
        closed_since: DateTime<Utc>,
    ) -> Result<Option<TopicThread>> {
        let g = self.inner.read();
        Ok(g.threads
            .values()
            .filter(|t| t.client_id == client_id && t.normalized_name == normalized_name)
            .filter_map(|t| t.status.closed_at().map(|c| (c, t)))
            .filter(|(closed_at, _)| *closed_at >= closed_since)
            .max_by_key(|(closed_at, _)| *closed_at)
            .map(|(_, t)| t.clone()))
    }

    async fn thread(&self, id: &str) -> Result<Option<TopicThread>> {
        Ok(self.inner.read().threads.get(id).cloned())
    }

    async fn insert_thread(&self, thread: &TopicThread) -> Result<()> {
        let mut g = self.inner.write();
        if g.threads.contains_key(&thread.id) {
            return Err(anyhow!("thread {} already exists", thread.id));
        }
        g.threads.insert(thread.id.clone(), thread.clone());
        Ok(())
    }

    async fn save_thread(&self, thread: &TopicThread) -> Result<()> {
        let mut g = self.inner.write();
        match g.threads.get_mut(&thread.id) {
            Some(slot) => {
                *slot = thread.clone();
                Ok(())
            }
            None => Err(anyhow!("thread {} not found", thread.id)),
        }
    }

    async fn active_threads_idle_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<TopicThread>> {
        let g = self.inner.read();
        Ok(g.threads
            .values()
            .filter(|t| t.status.is_active() && t.last_mention_at < cutoff)
            .cloned()
            .collect())
    }

    async fn append_event(&self, event: &ThreadEvent) -> Result<()> {
        self.inner.write().events.push(event.clone());
        Ok(())
    }

    async fn events_for_thread(&self, thread_id: &str) -> Result<Vec<ThreadEvent>> {
        let g = self.inner.read();
        Ok(g.events
            .iter()
            .filter(|e| e.topic_thread_id == thread_id)
            .cloned()
            .collect())
    }

    async fn count_client_events_since(
        &self,
        client_id: &str,
        kind: ThreadEventKind,
        since: DateTime<Utc>,
    ) -> Result<usize> {
        let g = self.inner.read();
        Ok(g.events
            .iter()
            .filter(|e| e.client_id == client_id && e.kind == kind && e.created_at >= since)
            .count())
    }
}

#[async_trait]
impl SovStore for MemoryStore {
    async fn client(&self, id: &str) -> Result<Option<Client>> {
        Ok(self.inner.read().clients.get(id).cloned())
    }

    async fn competitor_names(&self, client_id: &str) -> Result<Vec<String>> {
        Ok(self
            .inner
            .read()
            .competitors
            .get(client_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn org_clients(&self, org_id: &str) -> Result<Vec<Client>> {
        let g = self.inner.read();
        let mut v: Vec<Client> = g
            .clients
            .values()
            .filter(|c| c.org_id == org_id && c.active)
            .cloned()
            .collect();
        v.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(v)
    }

    async fn client_item_sources(
        &self,
        client_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<String>> {
        let g = self.inner.read();
        Ok(g.items
            .iter()
            .filter(|m| m.kind == ItemKind::Mention && m.client_id == client_id)
            .filter(|m| m.created_at >= from && m.created_at <= to)
            .map(|m| m.source.clone())
            .collect())
    }

    async fn org_item_sources(
        &self,
        org_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<String>> {
        let g = self.inner.read();
        Ok(g.items
            .iter()
            .filter(|m| m.kind == ItemKind::Mention)
            .filter(|m| {
                g.clients
                    .get(&m.client_id)
                    .is_some_and(|c| c.org_id == org_id)
            })
            .filter(|m| m.created_at >= from && m.created_at <= to)
            .map(|m| m.source.clone())
            .collect())
    }

    async fn source_tier(&self, domain: &str) -> Result<Option<u8>> {
        Ok(self.inner.read().tiers.tier_for_domain(domain))
    }
}
