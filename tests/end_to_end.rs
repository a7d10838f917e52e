// tests/end_to_end.rs
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use mention_signals::cluster::{Comparison, FixedComparator};
use mention_signals::notify::{MemoryQueue, NotificationType};
use mention_signals::store::{MentionStore, SovStore, ThreadStore};
use mention_signals::{
    Client, EngineConfig, ItemKind, MemoryStore, MentionItem, Sentiment, SignalsEngine,
    ThreadEvent, ThreadEventKind, TopicThread,
};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 9, 6, 9, 0, 0).unwrap()
}

fn mention(id: &str, title: &str, s: Sentiment, at: DateTime<Utc>) -> MentionItem {
    MentionItem {
        id: id.into(),
        kind: ItemKind::Mention,
        client_id: "client-x".into(),
        title: title.into(),
        summary: None,
        sentiment: s,
        source: "https://www.eltiempo.com/tecnologia".into(),
        published_at: at,
        created_at: at,
        parent_id: None,
        cluster_score: None,
        topic_thread_id: None,
        topic: Some("data breach".into()),
    }
}

fn engine(store: Arc<MemoryStore>, queue: Arc<MemoryQueue>) -> SignalsEngine {
    SignalsEngine::with_comparator(
        EngineConfig::default(),
        store,
        queue,
        Arc::new(FixedComparator::new(Comparison::rejected())),
    )
}

#[tokio::test]
async fn data_breach_story_end_to_end() {
    let store = Arc::new(MemoryStore::new());
    let queue = Arc::new(MemoryQueue::new());
    let engine = engine(store.clone(), queue.clone());

    let items = [
        mention("m1", "Empresa X confirma filtración masiva de datos", Sentiment::Negative, t0()),
        mention(
            "m2",
            "Empresa X confirma filtración masiva de datos personales",
            Sentiment::Negative,
            t0() + Duration::minutes(30),
        ),
        mention(
            "m3",
            "Expertos elogian respuesta rápida ante incidente",
            Sentiment::Positive,
            t0() + Duration::minutes(60),
        ),
    ];
    // Items land in the store as they are ingested.
    let ingest = |i: usize| store.insert_item(items[i].clone());

    // 1st: new thread, no new-topic notification yet.
    ingest(0);
    let o1 = engine.process_item_at(&items[0], items[0].created_at).await.unwrap();
    let thread_id = o1.thread.as_ref().unwrap().thread_id.clone();
    assert!(o1.cluster.unwrap().parent_id.is_none());
    assert!(queue.jobs().is_empty());

    // 2nd: near-duplicate title clusters under m1; new-topic fires.
    ingest(1);
    let o2 = engine.process_item_at(&items[1], items[1].created_at).await.unwrap();
    assert_eq!(o2.cluster.unwrap().parent_id.as_deref(), Some("m1"));
    assert_eq!(o2.thread.unwrap().thread_id, thread_id);
    let topic_new = store
        .all_events()
        .iter()
        .filter(|e| e.kind == ThreadEventKind::TopicNew && e.topic_thread_id == thread_id)
        .count();
    assert_eq!(topic_new, 1);

    // 3rd: unrelated title, same topic; NEGATIVE stays ahead 2:1.
    ingest(2);
    let o3 = engine.process_item_at(&items[2], items[2].created_at).await.unwrap();
    assert!(o3.cluster.unwrap().parent_id.is_none());
    assert!(o3.thread.unwrap().signals.is_empty());

    let threads = store.threads_for_client("client-x");
    assert_eq!(threads.len(), 1);
    let t = &threads[0];
    assert_eq!(t.mention_count, 3);
    assert_eq!(t.sentiment_breakdown.negative, 2);
    assert_eq!(t.sentiment_breakdown.positive, 1);
    assert_eq!(t.sentiment_breakdown.neutral, 0);
    assert_eq!(t.sentiment_breakdown.mixed, 0);
    assert_eq!(t.dominant_sentiment, Sentiment::Negative);
    assert_eq!(t.top_sources, vec!["https://www.eltiempo.com/tecnologia"]);

    assert!(!store
        .all_events()
        .iter()
        .any(|e| e.kind == ThreadEventKind::SentimentShift));

    let jobs = queue.jobs();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].event_type, NotificationType::New);
    assert_eq!(jobs[0].topic_thread_id, thread_id);
    assert_eq!(jobs[0].client_id, "client-x");

    let stored = store.get_item(ItemKind::Mention, "m2").unwrap();
    assert_eq!(stored.parent_id.as_deref(), Some("m1"));
    assert_eq!(stored.topic_thread_id.as_deref(), Some(thread_id.as_str()));
}

#[tokio::test]
async fn social_items_join_threads_without_clustering() {
    let store = Arc::new(MemoryStore::new());
    let queue = Arc::new(MemoryQueue::new());
    let engine = engine(store.clone(), queue);

    let mut post = mention("s1", "Empresa X confirma filtración", Sentiment::Mixed, t0());
    post.kind = ItemKind::Social;
    post.source = "@periodista".into();
    store.insert_item(post.clone());

    let out = engine.process(ItemKind::Social, "s1").await.unwrap().unwrap();
    assert!(out.cluster.is_none());
    assert!(out.thread.is_some());
    assert_eq!(store.threads_for_client("client-x")[0].social_mention_count, 1);

    assert!(engine
        .process(ItemKind::Mention, "missing")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test(start_paused = true)]
async fn maintenance_loop_closes_idle_threads() {
    let store = Arc::new(MemoryStore::new());
    let queue = Arc::new(MemoryQueue::new());
    let engine = engine(store.clone(), queue);

    let long_ago = Utc::now() - Duration::hours(100);
    let it = mention("m1", "Empresa X confirma filtración", Sentiment::Negative, long_ago);
    store.insert_item(it.clone());
    engine.process_item_at(&it, long_ago).await.unwrap();

    let handles = engine.spawn_maintenance();
    let mut closed = false;
    for _ in 0..20 {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        if !store.threads_for_client("client-x")[0].status.is_active() {
            closed = true;
            break;
        }
    }
    for h in handles {
        h.abort();
    }
    assert!(closed);
    assert!(store
        .all_events()
        .iter()
        .any(|e| e.kind == ThreadEventKind::Closed));
}

/// Memory store whose candidate lookup always times out.
struct RootsDownStore(Arc<MemoryStore>);

#[async_trait]
impl MentionStore for RootsDownStore {
    async fn item(&self, kind: ItemKind, id: &str) -> Result<Option<MentionItem>> {
        self.0.item(kind, id).await
    }

    async fn recent_roots(
        &self,
        _client_id: &str,
        _since: DateTime<Utc>,
        _limit: usize,
        _exclude_id: Option<&str>,
    ) -> Result<Vec<MentionItem>> {
        Err(anyhow!("db timeout"))
    }

    async fn set_cluster_parent(
        &self,
        kind: ItemKind,
        id: &str,
        parent_id: &str,
        score: f32,
    ) -> Result<()> {
        self.0.set_cluster_parent(kind, id, parent_id, score).await
    }

    async fn set_item_thread(&self, kind: ItemKind, id: &str, thread_id: &str) -> Result<()> {
        self.0.set_item_thread(kind, id, thread_id).await
    }

    async fn items_for_thread(&self, thread_id: &str) -> Result<Vec<MentionItem>> {
        self.0.items_for_thread(thread_id).await
    }
}

#[async_trait]
impl ThreadStore for RootsDownStore {
    async fn active_thread(&self, client_id: &str, normalized_name: &str) -> Result<Option<TopicThread>> {
        self.0.active_thread(client_id, normalized_name).await
    }

    async fn reopenable_thread(
        &self,
        client_id: &str,
        normalized_name: &str,
        closed_since: DateTime<Utc>,
    ) -> Result<Option<TopicThread>> {
        self.0.reopenable_thread(client_id, normalized_name, closed_since).await
    }

    async fn thread(&self, id: &str) -> Result<Option<TopicThread>> {
        self.0.thread(id).await
    }

    async fn insert_thread(&self, thread: &TopicThread) -> Result<()> {
        self.0.insert_thread(thread).await
    }

    async fn save_thread(&self, thread: &TopicThread) -> Result<()> {
        self.0.save_thread(thread).await
    }

    async fn active_threads_idle_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<TopicThread>> {
        self.0.active_threads_idle_since(cutoff).await
    }

    async fn append_event(&self, event: &ThreadEvent) -> Result<()> {
        self.0.append_event(event).await
    }

    async fn events_for_thread(&self, thread_id: &str) -> Result<Vec<ThreadEvent>> {
        self.0.events_for_thread(thread_id).await
    }

    async fn count_client_events_since(
        &self,
        client_id: &str,
        kind: ThreadEventKind,
        since: DateTime<Utc>,
    ) -> Result<usize> {
        self.0.count_client_events_since(client_id, kind, since).await
    }
}

#[async_trait]
impl SovStore for RootsDownStore {
    async fn client(&self, id: &str) -> Result<Option<Client>> {
        self.0.client(id).await
    }

    async fn competitor_names(&self, client_id: &str) -> Result<Vec<String>> {
        self.0.competitor_names(client_id).await
    }

    async fn org_clients(&self, org_id: &str) -> Result<Vec<Client>> {
        self.0.org_clients(org_id).await
    }

    async fn client_item_sources(
        &self,
        client_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<String>> {
        self.0.client_item_sources(client_id, from, to).await
    }

    async fn org_item_sources(
        &self,
        org_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<String>> {
        self.0.org_item_sources(org_id, from, to).await
    }

    async fn source_tier(&self, domain: &str) -> Result<Option<u8>> {
        self.0.source_tier(domain).await
    }
}

#[tokio::test]
async fn clustering_outage_still_assigns_thread() {
    let inner = Arc::new(MemoryStore::new());
    let queue = Arc::new(MemoryQueue::new());
    let engine = SignalsEngine::with_comparator(
        EngineConfig::default(),
        Arc::new(RootsDownStore(inner.clone())),
        queue,
        Arc::new(FixedComparator::new(Comparison::rejected())),
    );

    let it = mention("m1", "Empresa X confirma filtración masiva de datos", Sentiment::Negative, t0());
    inner.insert_item(it.clone());

    let out = engine.process_item_at(&it, t0()).await.unwrap();
    let cluster = out.cluster.unwrap();
    assert!(cluster.parent_id.is_none());
    assert_eq!(cluster.score, 0.0);
    let thread_id = out.thread.unwrap().thread_id;

    let threads = inner.threads_for_client("client-x");
    assert_eq!(threads.len(), 1);
    assert_eq!(threads[0].id, thread_id);
    assert_eq!(threads[0].mention_count, 1);
    let stored = inner.get_item(ItemKind::Mention, "m1").unwrap();
    assert_eq!(stored.topic_thread_id.as_deref(), Some(thread_id.as_str()));
    assert!(stored.parent_id.is_none());
}
