use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::OnceCell;
use std::net::SocketAddr;

/// One-time metrics registration (so series show up on the exporter).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("cluster_cache_hits_total", "Cluster resolutions served from cache.");
        describe_counter!(
            "cluster_cache_misses_total",
            "Cluster resolutions that had to scan candidates."
        );
        describe_counter!(
            "cluster_comparisons_total",
            "Same-event comparator calls issued."
        );
        describe_counter!(
            "cluster_comparator_failures_total",
            "Comparator calls that failed, timed out or returned garbage."
        );
        describe_counter!(
            "cluster_matches_total",
            "Accepted cluster parents, labelled by decision path."
        );
        describe_counter!(
            "thread_events_total",
            "Topic thread events appended, labelled by kind."
        );
        describe_counter!(
            "thread_notifications_suppressed_total",
            "Notification-worthy events suppressed by caps or cooldowns."
        );
        describe_counter!("threads_closed_total", "Threads closed by the inactivity sweep.");
        describe_counter!(
            "maintenance_runs_total",
            "Completed maintenance ticks, labelled by job."
        );
        describe_gauge!("cluster_cache_entries", "Entries held by the cluster cache.");
    });
}

/// Install a Prometheus recorder with its own HTTP listener.
pub fn install_prometheus(addr: SocketAddr) -> anyhow::Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("prometheus: install exporter: {e}"))?;
    ensure_metrics_described();
    Ok(())
}

/// Short anonymized id for log lines; raw titles never reach the logs.
pub(crate) fn anon_id(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(text.as_bytes());
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}
