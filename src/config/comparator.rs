// src/config/comparator.rs
use serde::{Deserialize, Serialize};
use std::env;

fn default_provider() -> String {
    "anthropic".to_string()
}
fn default_model() -> String {
    "claude-3-5-haiku-latest".to_string()
}
fn default_api_key() -> String {
    "ENV".to_string()
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_max_tokens() -> u32 {
    150
}

/// Same-event comparison service settings (`[comparator]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparatorConfig {
    #[serde(default)]
    pub enabled: bool,
    /// "anthropic" | "fixed" (case-insensitive)
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// "ENV" means: read from ANTHROPIC_API_KEY
    #[serde(default = "default_api_key")]
    pub api_key: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for ComparatorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: default_provider(),
            model: default_model(),
            api_key: default_api_key(),
            timeout_secs: default_timeout_secs(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl ComparatorConfig {
    /// Normalize provider and resolve an "ENV" key. Only fails when the
    /// comparator is enabled and the key cannot be found.
    pub fn resolve(mut self) -> anyhow::Result<Self> {
        self.provider = self.provider.trim().to_lowercase();

        if self.api_key.trim().eq_ignore_ascii_case("env") {
            self.api_key = match self.provider.as_str() {
                "anthropic" => match env::var("ANTHROPIC_API_KEY") {
                    Ok(k) => k,
                    Err(_) if !self.enabled => String::new(),
                    Err(_) => anyhow::bail!("Missing ANTHROPIC_API_KEY env var"),
                },
                _ => String::new(),
            };
        }

        if self.timeout_secs == 0 {
            self.timeout_secs = default_timeout_secs();
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[serial_test::serial]
    #[test]
    fn disabled_comparator_tolerates_missing_key() {
        env::remove_var("ANTHROPIC_API_KEY");
        let cfg = ComparatorConfig::default().resolve().unwrap();
        assert!(cfg.api_key.is_empty());
    }

    #[serial_test::serial]
    #[test]
    fn enabled_comparator_requires_key() {
        env::remove_var("ANTHROPIC_API_KEY");
        let cfg = ComparatorConfig {
            enabled: true,
            ..Default::default()
        };
        assert!(cfg.resolve().is_err());

        env::set_var("ANTHROPIC_API_KEY", "sk-test");
        let cfg = ComparatorConfig {
            enabled: true,
            provider: " Anthropic ".into(),
            timeout_secs: 0,
            ..Default::default()
        }
        .resolve()
        .unwrap();
        assert_eq!(cfg.provider, "anthropic");
        assert_eq!(cfg.api_key, "sk-test");
        assert_eq!(cfg.timeout_secs, 10);
        env::remove_var("ANTHROPIC_API_KEY");
    }
}
