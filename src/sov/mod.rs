//! # Share of Voice
//! Tier-weighted share of voice for a client against its declared
//! competitors, weekly history against the whole tenant, and tenant-wide
//! ranking.
//!
//! Only `ItemKind::Mention` rows count toward share of voice.

pub mod tiers;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::config::SovConfig;
use crate::error::SovError;
use crate::model::Client;
use crate::store::SovStore;

pub use tiers::{extract_domain, tier_weight, SourceTierTable};

pub const MAX_WINDOW_DAYS: u32 = 365;
pub const MAX_HISTORY_WEEKS: u32 = 52;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SovResult {
    pub client_id: String,
    pub client_name: String,
    pub mentions: u64,
    /// Percentage 0-100.
    pub sov: f64,
    pub weighted_mentions: u64,
    pub weighted_sov: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SovPeriod {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub days: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SovData {
    pub client: SovResult,
    pub competitors: Vec<SovResult>,
    pub total: u64,
    pub total_weighted: u64,
    pub period: SovPeriod,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SovHistoryPoint {
    pub week_start: DateTime<Utc>,
    pub sov: f64,
    pub weighted_sov: f64,
    pub mentions: u64,
}

/// Percentage of `part` in `total`; 0 when `total` is 0.
pub fn share(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Counts {
    raw: u64,
    weighted: u64,
}

pub struct SovAggregator {
    store: Arc<dyn SovStore>,
    cfg: SovConfig,
}

impl SovAggregator {
    pub fn new(store: Arc<dyn SovStore>, cfg: SovConfig) -> Self {
        Self { store, cfg }
    }

    /// Configured default window, competitors included.
    pub async fn compute_default(&self, client_id: &str) -> Result<SovData, SovError> {
        self.compute_sov(client_id, self.cfg.default_window_days, true)
            .await
    }

    pub async fn compute_sov(
        &self,
        client_id: &str,
        window_days: u32,
        include_competitors: bool,
    ) -> Result<SovData, SovError> {
        self.compute_sov_at(client_id, window_days, include_competitors, Utc::now())
            .await
    }

    pub async fn compute_sov_at(
        &self,
        client_id: &str,
        window_days: u32,
        include_competitors: bool,
        now: DateTime<Utc>,
    ) -> Result<SovData, SovError> {
        if !(1..=MAX_WINDOW_DAYS).contains(&window_days) {
            return Err(SovError::InvalidWindow(window_days));
        }
        let client = self.require_client(client_id).await?;
        let start = now - Duration::days(window_days as i64);

        let mut tiers = HashMap::new();
        let own = self.client_counts(&client.id, start, now, &mut tiers).await?;

        let mut rivals: Vec<(Client, Counts)> = Vec::new();
        if include_competitors {
            for c in self.competitors_of(&client).await? {
                let counts = self.client_counts(&c.id, start, now, &mut tiers).await?;
                rivals.push((c, counts));
            }
        }

        let total = own.raw + rivals.iter().map(|(_, c)| c.raw).sum::<u64>();
        let total_weighted = own.weighted + rivals.iter().map(|(_, c)| c.weighted).sum::<u64>();

        let result = |c: &Client, n: Counts| SovResult {
            client_id: c.id.clone(),
            client_name: c.name.clone(),
            mentions: n.raw,
            sov: share(n.raw, total),
            weighted_mentions: n.weighted,
            weighted_sov: share(n.weighted, total_weighted),
        };

        debug!(
            target: "sov", client = %client.id, window_days, total, total_weighted,
            competitors = rivals.len(), "share of voice computed"
        );

        Ok(SovData {
            client: result(&client, own),
            competitors: rivals.iter().map(|(c, n)| result(c, *n)).collect(),
            total,
            total_weighted,
            period: SovPeriod {
                start,
                end: now,
                days: window_days,
            },
        })
    }

    pub async fn history_default(&self, client_id: &str) -> Result<Vec<SovHistoryPoint>, SovError> {
        self.history(client_id, self.cfg.default_history_weeks).await
    }

    pub async fn history(
        &self,
        client_id: &str,
        weeks: u32,
    ) -> Result<Vec<SovHistoryPoint>, SovError> {
        self.history_at(client_id, weeks, Utc::now()).await
    }

    /// One point per calendar week (seven whole UTC days ending on the day of
    /// `now - 7*i`), oldest first. The denominator is the tenant's whole volume.
    pub async fn history_at(
        &self,
        client_id: &str,
        weeks: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<SovHistoryPoint>, SovError> {
        if !(1..=MAX_HISTORY_WEEKS).contains(&weeks) {
            return Err(SovError::InvalidWeeks(weeks));
        }
        let client = self.require_client(client_id).await?;
        let today = now.date_naive().and_time(NaiveTime::MIN).and_utc();

        let mut tiers = HashMap::new();
        let mut points = Vec::with_capacity(weeks as usize);
        for i in (0..weeks as i64).rev() {
            let week_end = today - Duration::days(7 * i) + Duration::days(1) - Duration::milliseconds(1);
            let week_start = today - Duration::days(7 * i + 6);

            let own = self
                .client_counts(&client.id, week_start, week_end, &mut tiers)
                .await?;
            let org_sources = self
                .store
                .org_item_sources(&client.org_id, week_start, week_end)
                .await?;
            let org = self.weigh(&org_sources, &mut tiers).await?;

            points.push(SovHistoryPoint {
                week_start,
                sov: share(own.raw, org.raw),
                weighted_sov: share(own.weighted, org.weighted),
                mentions: own.raw,
            });
        }
        Ok(points)
    }

    pub async fn org_sov(&self, org_id: &str, days: u32) -> Result<Vec<SovResult>, SovError> {
        self.org_sov_at(org_id, days, Utc::now()).await
    }

    /// Every active client of the tenant, ranked by raw share descending.
    pub async fn org_sov_at(
        &self,
        org_id: &str,
        days: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<SovResult>, SovError> {
        let clients = self.store.org_clients(org_id).await?;

        // First pass: each client's own counts.
        let mut results = Vec::with_capacity(clients.len());
        for c in &clients {
            let data = self.compute_sov_at(&c.id, days, false, now).await?;
            results.push(data.client);
        }

        // Second pass: tenant-wide denominators.
        let total: u64 = results.iter().map(|r| r.mentions).sum();
        let total_weighted: u64 = results.iter().map(|r| r.weighted_mentions).sum();
        for r in &mut results {
            r.sov = share(r.mentions, total);
            r.weighted_sov = share(r.weighted_mentions, total_weighted);
        }
        results.sort_by(|a, b| b.sov.total_cmp(&a.sov));
        Ok(results)
    }

    async fn require_client(&self, client_id: &str) -> Result<Client, SovError> {
        self.store
            .client(client_id)
            .await?
            .ok_or_else(|| SovError::ClientNotFound(client_id.to_string()))
    }

    /// Active clients of the same tenant whose name contains a declared
    /// competitor name (case-insensitive), excluding the client itself.
    async fn competitors_of(&self, client: &Client) -> Result<Vec<Client>, SovError> {
        let names: Vec<String> = self
            .store
            .competitor_names(&client.id)
            .await?
            .into_iter()
            .map(|n| n.trim().to_lowercase())
            .filter(|n| !n.is_empty())
            .collect();
        if names.is_empty() {
            return Ok(vec![]);
        }
        let org = self.store.org_clients(&client.org_id).await?;
        Ok(org
            .into_iter()
            .filter(|c| c.id != client.id && c.active)
            .filter(|c| {
                let lower = c.name.to_lowercase();
                names.iter().any(|n| lower.contains(n.as_str()))
            })
            .collect())
    }

    async fn client_counts(
        &self,
        client_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        tiers: &mut HashMap<String, u32>,
    ) -> Result<Counts, SovError> {
        let sources = self.store.client_item_sources(client_id, from, to).await?;
        self.weigh(&sources, tiers).await
    }

    /// Raw and tier-weighted counts; `tiers` memoizes domain weights per call.
    async fn weigh(
        &self,
        sources: &[String],
        tiers: &mut HashMap<String, u32>,
    ) -> Result<Counts, SovError> {
        let mut counts = Counts::default();
        for src in sources {
            counts.raw += 1;
            let weight = match extract_domain(src) {
                None => 1,
                Some(domain) => match tiers.get(&domain) {
                    Some(w) => *w,
                    None => {
                        let w = tier_weight(self.store.source_tier(&domain).await?);
                        tiers.insert(domain, w);
                        w
                    }
                },
            };
            counts.weighted += weight as u64;
        }
        Ok(counts)
    }
}
