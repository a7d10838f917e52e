//! Bounded, TTL-aware cache of resolved cluster parents.
//!
//! Keys are `client_id + ":" + normalized title`. Entries are advisory: a
//! stale or evicted entry only costs a redundant comparison, never a wrong
//! assignment, because callers verify nothing from the cache beyond the id.
//!
//! Thread-safety is part of the contract: every `ClusterCache`
//! implementation must be shareable behind an `Arc` across tasks.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Swappable cache policy used by the resolver.
pub trait ClusterCache: Send + Sync {
    /// Parent id if present and not expired at `now` (lazy expiry).
    fn get_at(&self, key: &str, now: DateTime<Utc>) -> Option<String>;
    /// Insert or refresh with `now + ttl`.
    fn set_at(&self, key: &str, parent_id: &str, now: DateTime<Utc>);
    /// Drop every entry expired at `now`; returns how many were removed.
    fn cleanup_at(&self, now: DateTime<Utc>) -> usize;
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    fn get(&self, key: &str) -> Option<String> {
        self.get_at(key, Utc::now())
    }
    fn set(&self, key: &str, parent_id: &str) {
        self.set_at(key, parent_id, Utc::now())
    }
    fn cleanup(&self) -> usize {
        self.cleanup_at(Utc::now())
    }
}

pub fn cache_key(client_id: &str, normalized_title: &str) -> String {
    format!("{client_id}:{normalized_title}")
}

#[derive(Debug, Clone)]
struct Entry {
    parent_id: String,
    expires_at: DateTime<Utc>,
}

/// Mutex-guarded map with sweep-then-evict on overflow.
///
/// On a full `set`: purge expired entries first; if still full, evict the
/// ~20% of entries closest to expiry (oldest writes, since TTL is uniform).
#[derive(Debug)]
pub struct TtlCache {
    inner: Mutex<HashMap<String, Entry>>,
    ttl: Duration,
    capacity: usize,
}

impl TtlCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(HashMap::with_capacity(capacity.min(4096))),
            ttl,
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn make_room(map: &mut HashMap<String, Entry>, capacity: usize, now: DateTime<Utc>) {
        map.retain(|_, e| e.expires_at > now);
        if map.len() < capacity {
            return;
        }
        let evict = (capacity / 5).max(1).max(map.len() + 1 - capacity);
        let mut by_age: Vec<(DateTime<Utc>, String)> = map
            .iter()
            .map(|(k, e)| (e.expires_at, k.clone()))
            .collect();
        by_age.sort();
        for (_, k) in by_age.into_iter().take(evict) {
            map.remove(&k);
        }
    }
}

impl ClusterCache for TtlCache {
    fn get_at(&self, key: &str, now: DateTime<Utc>) -> Option<String> {
        let g = self.inner.lock();
        g.get(key)
            .filter(|e| e.expires_at > now)
            .map(|e| e.parent_id.clone())
    }

    fn set_at(&self, key: &str, parent_id: &str, now: DateTime<Utc>) {
        let mut g = self.inner.lock();
        if !g.contains_key(key) && g.len() >= self.capacity {
            Self::make_room(&mut g, self.capacity, now);
        }
        g.insert(
            key.to_string(),
            Entry {
                parent_id: parent_id.to_string(),
                expires_at: now + self.ttl,
            },
        );
        metrics::gauge!("cluster_cache_entries").set(g.len() as f64);
    }

    fn cleanup_at(&self, now: DateTime<Utc>) -> usize {
        let mut g = self.inner.lock();
        let before = g.len();
        g.retain(|_, e| e.expires_at > now);
        let removed = before - g.len();
        metrics::gauge!("cluster_cache_entries").set(g.len() as f64);
        removed
    }

    fn len(&self) -> usize {
        self.inner.lock().len()
    }
}
