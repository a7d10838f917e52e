//! Engine configuration loaded from TOML with env overrides.
//!
//! Lookup order:
//! 1) `$SIGNALS_CONFIG_PATH` (must exist)
//! 2) `config/signals.toml` (optional, defaults when absent)
//!
//! Every field has a default, so an empty file is a valid config.

pub mod comparator;

use anyhow::{anyhow, Context, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub use comparator::ComparatorConfig;

pub const DEFAULT_CONFIG_PATH: &str = "config/signals.toml";
pub const ENV_CONFIG_PATH: &str = "SIGNALS_CONFIG_PATH";
pub const ENV_REOPEN_WINDOW_HOURS: &str = "SIGNALS_REOPEN_WINDOW_HOURS";
pub const ENV_CACHE_TTL_SECS: &str = "SIGNALS_CACHE_TTL_SECS";

/// Upper bound (one year) for every hour-based window.
const MAX_HOURS: i64 = 8760;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub cluster: ClusterConfig,
    #[serde(default)]
    pub threads: ThreadConfig,
    #[serde(default)]
    pub sov: SovConfig,
    #[serde(default)]
    pub comparator: ComparatorConfig,
    #[serde(default)]
    pub maintenance: MaintenanceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub cache_ttl_secs: u64,
    pub cache_capacity: usize,
    /// Max recent root items compared per resolution.
    pub candidate_limit: usize,
    pub lookback_hours: i64,
    /// Keyword overlap needed to become a candidate at all.
    pub candidate_floor: f32,
    /// Keyword overlap accepted without asking the comparator.
    pub keyword_accept: f32,
    /// Comparator confidence needed to accept a same-event verdict.
    pub comparator_accept: f32,
    pub top_candidates: usize,
    /// Score reported for cache hits.
    pub cache_hit_score: f32,
    pub comparator_timeout_secs: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 30 * 60,
            cache_capacity: 1000,
            candidate_limit: 20,
            lookback_hours: 24,
            candidate_floor: 0.3,
            keyword_accept: 0.7,
            comparator_accept: 0.7,
            top_candidates: 3,
            cache_hit_score: 0.9,
            comparator_timeout_secs: 10,
        }
    }
}

impl ClusterConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::seconds(self.cache_ttl_secs as i64)
    }

    pub fn lookback(&self) -> Duration {
        Duration::hours(self.lookback_hours)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThreadConfig {
    pub reopen_window_hours: i64,
    pub inactivity_hours: i64,
    /// Ascending notification thresholds on total item count.
    pub thresholds: Vec<u32>,
    pub daily_new_topic_cap: usize,
    pub shift_cooldown_hours: i64,
    pub top_sources_cap: usize,
}

impl Default for ThreadConfig {
    fn default() -> Self {
        Self {
            reopen_window_hours: 72,
            inactivity_hours: 72,
            thresholds: vec![5, 10, 20, 50],
            daily_new_topic_cap: 10,
            shift_cooldown_hours: 4,
            top_sources_cap: 10,
        }
    }
}

impl ThreadConfig {
    pub fn reopen_window(&self) -> Duration {
        Duration::hours(self.reopen_window_hours)
    }

    pub fn inactivity(&self) -> Duration {
        Duration::hours(self.inactivity_hours)
    }

    pub fn shift_cooldown(&self) -> Duration {
        Duration::hours(self.shift_cooldown_hours)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SovConfig {
    pub default_window_days: u32,
    pub default_history_weeks: u32,
}

impl Default for SovConfig {
    fn default() -> Self {
        Self {
            default_window_days: 30,
            default_history_weeks: 8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    pub close_inactive_interval_secs: u64,
    pub cache_cleanup_interval_secs: u64,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            close_inactive_interval_secs: 6 * 3600,
            cache_cleanup_interval_secs: 5 * 60,
        }
    }
}

impl EngineConfig {
    /// Load from an explicit TOML path, then apply env overrides.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading engine config from {}", path.display()))?;
        let mut cfg: EngineConfig = toml::from_str(&content)
            .with_context(|| format!("parsing engine config {}", path.display()))?;
        cfg.apply_env_overrides();
        cfg.sanitize();
        Ok(cfg)
    }

    /// Load using env var + fallback path; defaults when nothing is configured.
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            return Self::load_from(&pb);
        }
        let default_p = PathBuf::from(DEFAULT_CONFIG_PATH);
        if default_p.exists() {
            return Self::load_from(&default_p);
        }
        let mut cfg = Self::default();
        cfg.apply_env_overrides();
        cfg.sanitize();
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) {
        if let Some(h) = parse_positive_env(ENV_REOPEN_WINDOW_HOURS)
            .and_then(|h| i64::try_from(h).ok())
        {
            self.threads.reopen_window_hours = h;
        }
        if let Some(s) = parse_positive_env(ENV_CACHE_TTL_SECS) {
            self.cluster.cache_ttl_secs = s;
        }
    }

    /// Clamp thresholds into sane ranges and keep notification thresholds ascending.
    fn sanitize(&mut self) {
        let c = &mut self.cluster;
        c.candidate_floor = c.candidate_floor.clamp(0.0, 1.0);
        c.keyword_accept = c.keyword_accept.clamp(0.0, 1.0);
        c.comparator_accept = c.comparator_accept.clamp(0.0, 1.0);
        c.cache_hit_score = c.cache_hit_score.clamp(0.0, 1.0);
        if c.cache_capacity == 0 {
            c.cache_capacity = 1;
        }
        c.cache_ttl_secs = c.cache_ttl_secs.clamp(1, MAX_HOURS as u64 * 3600);
        c.lookback_hours = c.lookback_hours.clamp(1, MAX_HOURS);
        c.comparator_timeout_secs = c.comparator_timeout_secs.clamp(1, 3600);

        let t = &mut self.threads;
        t.reopen_window_hours = t.reopen_window_hours.clamp(1, MAX_HOURS);
        t.inactivity_hours = t.inactivity_hours.clamp(1, MAX_HOURS);
        t.shift_cooldown_hours = t.shift_cooldown_hours.clamp(0, MAX_HOURS);
        t.thresholds.sort_unstable();
        t.thresholds.dedup();
        t.thresholds.retain(|&x| x > 0);
    }
}

// parse optional positive integer env; invalid values are ignored
fn parse_positive_env(name: &str) -> Option<u64> {
    std::env::var(name)
        .ok()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .filter(|&v| v > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{env, fs};

    #[test]
    fn defaults_match_documented_values() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.cluster.cache_ttl_secs, 1800);
        assert_eq!(cfg.cluster.candidate_limit, 20);
        assert_eq!(cfg.threads.thresholds, vec![5, 10, 20, 50]);
        assert_eq!(cfg.threads.reopen_window_hours, 72);
        assert_eq!(cfg.threads.daily_new_topic_cap, 10);
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let s = r#"
            [threads]
            thresholds = [20, 5, 5, 0]
            shift_cooldown_hours = 2

            [cluster]
            keyword_accept = 1.7
        "#;
        let mut cfg: EngineConfig = toml::from_str(s).unwrap();
        cfg.sanitize();
        assert_eq!(cfg.threads.thresholds, vec![5, 20]);
        assert_eq!(cfg.threads.shift_cooldown_hours, 2);
        assert_eq!(cfg.threads.reopen_window_hours, 72);
        assert_eq!(cfg.cluster.keyword_accept, 1.0);
        assert_eq!(cfg.cluster.candidate_floor, 0.3);
    }

    #[test]
    fn oversized_windows_are_clamped() {
        let s = r#"
            [threads]
            reopen_window_hours = 9223372036854775807
            inactivity_hours = -5
            shift_cooldown_hours = -1

            [cluster]
            cache_ttl_secs = 9223372036854775807
            lookback_hours = 0
        "#;
        let mut cfg: EngineConfig = toml::from_str(s).unwrap();
        cfg.sanitize();
        assert_eq!(cfg.threads.reopen_window_hours, 8760);
        assert_eq!(cfg.threads.inactivity_hours, 1);
        assert_eq!(cfg.threads.shift_cooldown_hours, 0);
        assert_eq!(cfg.cluster.cache_ttl_secs, 8760 * 3600);
        assert_eq!(cfg.cluster.lookback_hours, 1);
        // Durations build without overflow.
        assert_eq!(cfg.threads.reopen_window(), Duration::hours(8760));
        assert_eq!(cfg.cluster.cache_ttl(), Duration::hours(8760));
    }

    #[serial_test::serial]
    #[test]
    fn huge_env_window_is_clamped_not_wrapped() {
        let old = env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        env::set_current_dir(tmp.path()).unwrap();
        env::remove_var(ENV_CONFIG_PATH);

        env::set_var(ENV_REOPEN_WINDOW_HOURS, u64::MAX.to_string());
        let cfg = EngineConfig::load_default().unwrap();
        assert_eq!(cfg.threads.reopen_window_hours, 72);

        env::set_var(ENV_REOPEN_WINDOW_HOURS, i64::MAX.to_string());
        let cfg = EngineConfig::load_default().unwrap();
        assert_eq!(cfg.threads.reopen_window_hours, 8760);

        env::set_var(ENV_CACHE_TTL_SECS, u64::MAX.to_string());
        let cfg = EngineConfig::load_default().unwrap();
        assert_eq!(cfg.cluster.cache_ttl_secs, 8760 * 3600);

        env::remove_var(ENV_REOPEN_WINDOW_HOURS);
        env::remove_var(ENV_CACHE_TTL_SECS);
        env::set_current_dir(&old).unwrap();
    }

    #[serial_test::serial]
    #[test]
    fn default_uses_env_then_fallbacks() {
        let old = env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        env::set_current_dir(tmp.path()).unwrap();

        env::remove_var(ENV_CONFIG_PATH);
        env::remove_var(ENV_REOPEN_WINDOW_HOURS);

        // No file anywhere: defaults
        let cfg = EngineConfig::load_default().unwrap();
        assert_eq!(cfg.threads.reopen_window_hours, 72);

        // Env path wins, env override applied on top
        let p = tmp.path().join("custom.toml");
        fs::write(&p, "[threads]\nreopen_window_hours = 24\n").unwrap();
        env::set_var(ENV_CONFIG_PATH, p.display().to_string());
        let cfg = EngineConfig::load_default().unwrap();
        assert_eq!(cfg.threads.reopen_window_hours, 24);

        env::set_var(ENV_REOPEN_WINDOW_HOURS, "48");
        let cfg = EngineConfig::load_default().unwrap();
        assert_eq!(cfg.threads.reopen_window_hours, 48);

        env::set_var(ENV_REOPEN_WINDOW_HOURS, "not-a-number");
        let cfg = EngineConfig::load_default().unwrap();
        assert_eq!(cfg.threads.reopen_window_hours, 24);

        // Missing explicit path is an error
        env::set_var(ENV_CONFIG_PATH, tmp.path().join("nope.toml").display().to_string());
        assert!(EngineConfig::load_default().is_err());

        env::remove_var(ENV_CONFIG_PATH);
        env::remove_var(ENV_REOPEN_WINDOW_HOURS);
        env::set_current_dir(&old).unwrap();
    }
}
