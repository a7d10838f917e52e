// tests/share_of_voice.rs
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use mention_signals::config::SovConfig;
use mention_signals::{
    Client, ItemKind, MemoryStore, MentionItem, Sentiment, SovAggregator, SovError,
};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 9, 6, 12, 0, 0).unwrap()
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

fn client(id: &str, org: &str, name: &str, active: bool) -> Client {
    Client {
        id: id.into(),
        org_id: org.into(),
        name: name.into(),
        active,
    }
}

fn put(store: &MemoryStore, id: &str, client: &str, source: &str, at: DateTime<Utc>) {
    store.insert_item(MentionItem {
        id: id.into(),
        kind: ItemKind::Mention,
        client_id: client.into(),
        title: "nota".into(),
        summary: None,
        sentiment: Sentiment::Neutral,
        source: source.into(),
        published_at: at,
        created_at: at,
        parent_id: None,
        cluster_score: None,
        topic_thread_id: None,
        topic: None,
    });
}

fn put_many(store: &MemoryStore, prefix: &str, client: &str, source: &str, n: usize) {
    for i in 0..n {
        put(
            store,
            &format!("{prefix}{i}"),
            client,
            source,
            now() - Duration::hours(1 + i as i64),
        );
    }
}

fn tenant() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.insert_client(client("acme", "org-1", "Banco Acme", true));
    store.insert_client(client("rival", "org-1", "Banco Rival", true));
    store.insert_client(client("norte", "org-1", "Aseguradora Norte", true));
    store.insert_client(client("old", "org-1", "Rival Viejo", false));
    store.insert_client(client("ext", "org-2", "Rival Externo", true));
    store.add_competitor("acme", "rival");
    store.set_source_tier("eltiempo.com", 1);
    store.set_source_tier("vanguardia.com", 2);
    store
}

fn aggregator(store: Arc<MemoryStore>) -> SovAggregator {
    SovAggregator::new(store, SovConfig::default())
}

#[tokio::test]
async fn client_share_against_competitors() {
    let store = tenant();
    put_many(&store, "a", "acme", "blog.example.org", 50);
    put_many(&store, "r", "rival", "https://www.eltiempo.com/economia/x", 150);
    put_many(&store, "x", "ext", "eltiempo.com", 30);
    put_many(&store, "o", "old", "eltiempo.com", 30);

    let sov = aggregator(store)
        .compute_sov_at("acme", 30, true, now())
        .await
        .unwrap();

    assert_eq!(sov.total, 200);
    assert_eq!(sov.client.mentions, 50);
    assert!(approx(sov.client.sov, 25.0));
    assert_eq!(sov.competitors.len(), 1);
    assert_eq!(sov.competitors[0].client_id, "rival");
    assert!(approx(sov.competitors[0].sov, 75.0));

    // Tier 1 weighs 3, unknown weighs 1.
    assert_eq!(sov.client.weighted_mentions, 50);
    assert_eq!(sov.competitors[0].weighted_mentions, 450);
    assert_eq!(sov.total_weighted, 500);
    assert!(approx(sov.client.weighted_sov, 10.0));

    let sum: f64 = sov.client.sov + sov.competitors.iter().map(|c| c.sov).sum::<f64>();
    assert!(approx(sum, 100.0));
    let wsum: f64 =
        sov.client.weighted_sov + sov.competitors.iter().map(|c| c.weighted_sov).sum::<f64>();
    assert!(approx(wsum, 100.0));

    assert_eq!(sov.period.days, 30);
    assert_eq!(sov.period.end, now());
    assert_eq!(sov.period.start, now() - Duration::days(30));
}

#[tokio::test]
async fn without_competitors_client_owns_everything() {
    let store = tenant();
    put_many(&store, "a", "acme", "vanguardia.com", 4);
    put_many(&store, "r", "rival", "eltiempo.com", 4);

    let sov = aggregator(store)
        .compute_sov_at("acme", 7, false, now())
        .await
        .unwrap();
    assert!(sov.competitors.is_empty());
    assert_eq!(sov.total, 4);
    assert_eq!(sov.total_weighted, 8);
    assert!(approx(sov.client.sov, 100.0));
}

#[tokio::test]
async fn empty_window_yields_zero_not_error() {
    let store = tenant();
    // Outside the 7 day window, and a social item inside it.
    put(&store, "old", "acme", "eltiempo.com", now() - Duration::days(10));
    store.insert_item(MentionItem {
        id: "s1".into(),
        kind: ItemKind::Social,
        client_id: "acme".into(),
        title: "post".into(),
        summary: None,
        sentiment: Sentiment::Neutral,
        source: "@acme".into(),
        published_at: now(),
        created_at: now(),
        parent_id: None,
        cluster_score: None,
        topic_thread_id: None,
        topic: None,
    });

    let sov = aggregator(store)
        .compute_sov_at("acme", 7, true, now())
        .await
        .unwrap();
    assert_eq!(sov.total, 0);
    assert_eq!(sov.client.sov, 0.0);
    assert_eq!(sov.client.weighted_sov, 0.0);
    assert_eq!(sov.competitors[0].sov, 0.0);
}

#[tokio::test]
async fn invalid_input_is_rejected() {
    let agg = aggregator(tenant());
    assert!(matches!(
        agg.compute_sov_at("acme", 0, true, now()).await,
        Err(SovError::InvalidWindow(0))
    ));
    assert!(matches!(
        agg.compute_sov_at("acme", 366, true, now()).await,
        Err(SovError::InvalidWindow(366))
    ));
    assert!(agg.compute_sov_at("acme", 365, true, now()).await.is_ok());
    assert!(matches!(
        agg.compute_sov_at("ghost", 30, true, now()).await,
        Err(SovError::ClientNotFound(id)) if id == "ghost"
    ));
    assert!(matches!(
        agg.history_at("acme", 0, now()).await,
        Err(SovError::InvalidWeeks(0))
    ));
    assert!(matches!(
        agg.history_at("acme", 53, now()).await,
        Err(SovError::InvalidWeeks(53))
    ));
}

#[tokio::test]
async fn weekly_history_uses_tenant_volume() {
    let store = tenant();
    // Current week: acme 1 of 4.
    put(&store, "a0", "acme", "eltiempo.com", now() - Duration::hours(1));
    for i in 0..3 {
        put(&store, &format!("r0{i}"), "rival", "blog.example.org", now() - Duration::hours(2 + i));
    }
    // Previous week: acme 1 of 2, the other one from a non-competitor.
    put(&store, "a1", "acme", "blog.example.org", now() - Duration::days(8));
    put(&store, "n1", "norte", "blog.example.org", now() - Duration::days(8));
    // Other tenants never count.
    put(&store, "x1", "ext", "eltiempo.com", now() - Duration::days(8));

    let points = aggregator(store).history_at("acme", 4, now()).await.unwrap();
    assert_eq!(points.len(), 4);
    assert!(points.windows(2).all(|w| w[0].week_start < w[1].week_start));

    let last = &points[3];
    assert_eq!(last.mentions, 1);
    assert!(approx(last.sov, 25.0));
    // 3 of (3 + 1 + 1 + 1)
    assert!(approx(last.weighted_sov, 50.0));

    let prev = &points[2];
    assert_eq!(prev.mentions, 1);
    assert!(approx(prev.sov, 50.0));

    assert_eq!(points[0].mentions, 0);
    assert_eq!(points[0].sov, 0.0);
}

#[tokio::test]
async fn org_ranking_sums_to_hundred() {
    let store = tenant();
    put_many(&store, "a", "acme", "blog.example.org", 2);
    put_many(&store, "r", "rival", "blog.example.org", 5);
    put_many(&store, "n", "norte", "eltiempo.com", 3);
    put_many(&store, "o", "old", "eltiempo.com", 9);

    let ranking = aggregator(store).org_sov_at("org-1", 30, now()).await.unwrap();
    let ids: Vec<&str> = ranking.iter().map(|r| r.client_id.as_str()).collect();
    assert_eq!(ids, vec!["rival", "norte", "acme"]);

    assert!(approx(ranking[0].sov, 50.0));
    let sum: f64 = ranking.iter().map(|r| r.sov).sum();
    assert!(approx(sum, 100.0));
    // weighted: 2 + 5 + 9
    assert!(approx(ranking[1].weighted_sov, 9.0 / 16.0 * 100.0));
}

#[tokio::test]
async fn default_history_spans_configured_weeks() {
    let store = tenant();
    put(&store, "a0", "acme", "eltiempo.com", Utc::now() - Duration::hours(1));
    let cfg = SovConfig::default();
    let weeks = cfg.default_history_weeks;

    let points = SovAggregator::new(store, cfg).history_default("acme").await.unwrap();
    assert_eq!(points.len(), weeks as usize);
    assert_eq!(points.last().unwrap().mentions, 1);
    assert!(approx(points.last().unwrap().sov, 100.0));
}
