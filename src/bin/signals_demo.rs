//! Demo that pushes a small "data breach" story through the in-memory engine
//! and prints the resulting thread, events, notification jobs and share of voice.

use std::sync::Arc;

use anyhow::Result;
use chrono::{Duration, Utc};
use mention_signals::notify::MemoryQueue;
use mention_signals::sov::SourceTierTable;
use mention_signals::{
    Client, EngineConfig, ItemKind, MemoryStore, MentionItem, Sentiment, SignalsEngine,
};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn mention(id: &str, client: &str, title: &str, s: Sentiment, source: &str, mins: i64) -> MentionItem {
    let ts = Utc::now() - Duration::hours(2) + Duration::minutes(mins);
    MentionItem {
        id: id.into(),
        kind: ItemKind::Mention,
        client_id: client.into(),
        title: title.into(),
        summary: None,
        sentiment: s,
        source: source.into(),
        published_at: ts,
        created_at: ts,
        parent_id: None,
        cluster_score: None,
        topic_thread_id: None,
        topic: Some("Data Breach".into()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("clustering=info,threads=info,sov=info,warn"));
    // SIGNALS_LOG_JSON=1 switches to one JSON object per line.
    let json = std::env::var("SIGNALS_LOG_JSON").is_ok_and(|v| v == "1" || v.eq_ignore_ascii_case("true"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }

    if let Ok(addr) = std::env::var("SIGNALS_METRICS_ADDR") {
        mention_signals::metrics::install_prometheus(addr.parse()?)?;
        tracing::info!(%addr, "prometheus exporter listening");
    }

    let cfg = EngineConfig::load_default()?;
    let store = Arc::new(MemoryStore::with_tiers(SourceTierTable::load_from_file(
        "config/source_tiers.json",
    )));
    store.insert_client(Client {
        id: "acme".into(),
        org_id: "org-1".into(),
        name: "Banco Acme".into(),
        active: true,
    });
    store.insert_client(Client {
        id: "rival".into(),
        org_id: "org-1".into(),
        name: "Banco Rival".into(),
        active: true,
    });
    store.add_competitor("acme", "Rival");

    let queue = Arc::new(MemoryQueue::new());
    let engine = SignalsEngine::new(cfg, store.clone(), queue.clone())?;

    let story = [
        mention("m1", "acme", "Banco Acme confirma filtración de datos de clientes", Sentiment::Negative, "https://www.eltiempo.com/economia/1", 0),
        mention("m2", "acme", "Banco Acme confirma filtración de datos de sus clientes", Sentiment::Negative, "semana.com", 20),
        mention("m3", "acme", "Acme refuerza seguridad tras filtración de datos", Sentiment::Positive, "https://blog.example.org/acme", 40),
        mention("r1", "rival", "Banco Rival lanza nueva app", Sentiment::Positive, "eltiempo.com", 10),
    ];

    for m in &story {
        store.insert_item(m.clone());
        let outcome = engine.process_item_at(m, m.created_at).await?;
        println!("{} -> {}", m.id, serde_json::to_string(&outcome)?);
    }

    for t in store.threads_for_client("acme") {
        println!("thread: {}", serde_json::to_string_pretty(&t)?);
    }
    for e in store.all_events() {
        println!("event: {} {}", e.kind.as_str(), e.payload);
    }
    for j in queue.drain() {
        println!("job [{}]: {}", j.event_type.job_name(), serde_json::to_string(&j)?);
    }

    let sov = engine.sov.compute_default("acme").await?;
    println!("sov: {}", serde_json::to_string_pretty(&sov)?);

    for p in engine.sov.history_default("acme").await? {
        println!("sov week {}: {:.1}% ({} mentions)", p.week_start.date_naive(), p.sov, p.mentions);
    }

    println!("signals-demo done");
    Ok(())
}
