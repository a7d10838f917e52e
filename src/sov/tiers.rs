//! # Source Tiers
//!
//! Reach classification of outlets by domain, used to weight mentions in
//! share of voice: tier 1 (national) = 3, tier 2 (regional) = 2,
//! tier 3 (digital/blogs) or unknown = 1.
//!
//! - Loads from JSON config (`{"domains": {"eltiempo.com": 1}}`).
//! - Domain extraction tolerates full URLs, bare domains and `www.` prefixes.
//! - Fallback order: exact domain → parent domain → unclassified.
//! - Includes a built-in `default_seed()` used when no config is found.

use serde::Deserialize;
use std::{collections::HashMap, fs, path::Path};

/// Domain → tier table.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceTierTable {
    #[serde(default)]
    pub domains: HashMap<String, u8>,
}

impl SourceTierTable {
    /// Load configuration from a JSON file.
    /// Falls back to `default_seed()` on error.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(path) {
            Ok(s) => match serde_json::from_str::<Self>(&s) {
                Ok(t) => t.normalized(),
                Err(e) => {
                    tracing::warn!(target: "sov", error = %e, "invalid source tier file, using seed");
                    Self::default_seed()
                }
            },
            Err(_) => Self::default_seed(),
        }
    }

    fn normalized(self) -> Self {
        let domains = self
            .domains
            .into_iter()
            .filter_map(|(k, v)| extract_domain(&k).map(|d| (d, v)))
            .collect();
        Self { domains }
    }

    pub fn insert(&mut self, domain: &str, tier: u8) {
        if let Some(d) = extract_domain(domain) {
            self.domains.insert(d, tier);
        }
    }

    /// Tier for a normalized domain: exact match, then closest parent domain.
    pub fn tier_for_domain(&self, domain: &str) -> Option<u8> {
        if let Some(&t) = self.domains.get(domain) {
            return Some(t);
        }
        let mut rest = domain;
        while let Some((_, parent)) = rest.split_once('.') {
            if !parent.contains('.') {
                break;
            }
            if let Some(&t) = self.domains.get(parent) {
                return Some(t);
            }
            rest = parent;
        }
        None
    }

    /// Built-in seed with a handful of national and regional outlets.
    pub fn default_seed() -> Self {
        let mut t = Self::default();
        for (d, tier) in [
            ("eltiempo.com", 1),
            ("elespectador.com", 1),
            ("semana.com", 1),
            ("eluniversal.com.mx", 1),
            ("reforma.com", 1),
            ("elpais.com", 1),
            ("reuters.com", 1),
            ("bloomberg.com", 1),
            ("elcolombiano.com", 2),
            ("elheraldo.co", 2),
            ("vanguardia.com", 2),
            ("milenio.com", 2),
            ("infobae.com", 3),
            ("pulzo.com", 3),
        ] {
            t.domains.insert(d.to_string(), tier);
        }
        t
    }
}

/// Mention weight for a tier.
pub fn tier_weight(tier: Option<u8>) -> u32 {
    match tier {
        Some(1) => 3,
        Some(2) => 2,
        _ => 1,
    }
}

/// Extract a normalized domain from a URL or outlet identifier.
/// Returns `None` for handles and names that carry no domain.
pub fn extract_domain(source: &str) -> Option<String> {
    let s = source.trim().to_ascii_lowercase();
    let rest = s
        .strip_prefix("https://")
        .or_else(|| s.strip_prefix("http://"))
        .unwrap_or(&s);
    let host = rest
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default();
    // drop userinfo and port
    let host = host.rsplit('@').next().unwrap_or_default();
    let host = host.split(':').next().unwrap_or_default();
    let host = host.strip_prefix("www.").unwrap_or(host);

    let valid = host.contains('.')
        && !host.starts_with('.')
        && !host.ends_with('.')
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-');
    if valid {
        Some(host.to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_domains_from_urls_and_bare_names() {
        assert_eq!(extract_domain("eltiempo.com").as_deref(), Some("eltiempo.com"));
        assert_eq!(
            extract_domain("https://www.ElTiempo.com/economia/nota-123?x=1").as_deref(),
            Some("eltiempo.com")
        );
        assert_eq!(extract_domain("http://semana.com:8080").as_deref(), Some("semana.com"));
        assert_eq!(extract_domain("www.pulzo.com/").as_deref(), Some("pulzo.com"));
    }

    #[test]
    fn handles_and_names_have_no_domain() {
        assert_eq!(extract_domain("@periodista"), None);
        assert_eq!(extract_domain("Radio Nacional"), None);
        assert_eq!(extract_domain(""), None);
    }

    #[test]
    fn parent_domain_fallback() {
        let t = SourceTierTable::default_seed();
        assert_eq!(t.tier_for_domain("eltiempo.com"), Some(1));
        assert_eq!(t.tier_for_domain("noticias.eltiempo.com"), Some(1));
        assert_eq!(t.tier_for_domain("blog.example.org"), None);
    }

    #[test]
    fn weights_by_tier() {
        assert_eq!(tier_weight(Some(1)), 3);
        assert_eq!(tier_weight(Some(2)), 2);
        assert_eq!(tier_weight(Some(3)), 1);
        assert_eq!(tier_weight(None), 1);
    }

    #[test]
    fn file_config_is_normalized() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("tiers.json");
        fs::write(&p, r#"{"domains": {"https://www.Milenio.com/": 2}}"#).unwrap();
        let t = SourceTierTable::load_from_file(&p);
        assert_eq!(t.tier_for_domain("milenio.com"), Some(2));

        let missing = SourceTierTable::load_from_file(dir.path().join("missing.json"));
        assert_eq!(missing.tier_for_domain("reuters.com"), Some(1));
    }
}
