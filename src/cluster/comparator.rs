//! Same-event comparison: provider abstraction + defensive response parsing.
//!
//! The resolver treats any error from `compare` as "not the same event".

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ComparatorConfig;

// ------------------------------------------------------------
// Public surface
// ------------------------------------------------------------

/// Verdict returned by a comparator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comparison {
    pub same_event: bool,
    /// Always within [0, 1].
    pub confidence: f32,
}

impl Comparison {
    pub fn rejected() -> Self {
        Self {
            same_event: false,
            confidence: 0.0,
        }
    }
}

#[async_trait]
pub trait EventComparator: Send + Sync {
    /// Decide whether two articles report the same real-world event.
    async fn compare(
        &self,
        title_a: &str,
        summary_a: &str,
        title_b: &str,
        summary_b: &str,
    ) -> Result<Comparison>;

    /// Provider name for diagnostics.
    fn provider_name(&self) -> &'static str;
}

/// Convenient alias used by callers.
pub type DynComparator = Arc<dyn EventComparator>;

/// Factory: build a comparator according to config.
///
/// * `enabled == false` → `DisabledComparator` (every candidate stays unconfirmed).
/// * `provider == "anthropic"` → `AnthropicComparator`.
/// * `provider == "fixed"` → deterministic rejecting comparator for local runs.
pub fn build_comparator(config: &ComparatorConfig) -> Result<DynComparator> {
    if !config.enabled {
        return Ok(Arc::new(DisabledComparator));
    }
    let config = config.clone().resolve()?;
    match config.provider.as_str() {
        "anthropic" => Ok(Arc::new(AnthropicComparator::new(&config)?)),
        "fixed" => Ok(Arc::new(FixedComparator::new(Comparison::rejected()))),
        other => Err(anyhow!("Unsupported comparator provider: {other}")),
    }
}

// ------------------------------------------------------------
// Concrete providers
// ------------------------------------------------------------

const ANTHROPIC_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic Messages API comparator. Requires a resolved API key.
pub struct AnthropicComparator {
    http: reqwest::Client,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl AnthropicComparator {
    pub fn new(config: &ComparatorConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(anyhow!("anthropic comparator enabled without an API key"));
        }
        let http = reqwest::Client::builder()
            .user_agent("mention-signals/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .context("building comparator http client")?;
        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl EventComparator for AnthropicComparator {
    async fn compare(
        &self,
        title_a: &str,
        summary_a: &str,
        title_b: &str,
        summary_b: &str,
    ) -> Result<Comparison> {
        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            max_tokens: u32,
            temperature: f32,
            messages: Vec<Msg<'a>>,
        }
        #[derive(Deserialize)]
        struct Resp {
            content: Vec<Block>,
        }
        #[derive(Deserialize)]
        struct Block {
            #[serde(rename = "type")]
            kind: String,
            #[serde(default)]
            text: String,
        }

        let prompt = build_prompt(title_a, summary_a, title_b, summary_b);
        let req = Req {
            model: &self.model,
            max_tokens: self.max_tokens,
            temperature: 0.0,
            messages: vec![Msg {
                role: "user",
                content: &prompt,
            }],
        };

        let resp = self
            .http
            .post(ANTHROPIC_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&req)
            .send()
            .await
            .context("comparator request")?;

        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("comparator returned status {status}");
        }
        let body: Resp = resp.json().await.context("comparator response body")?;
        let text = body
            .content
            .iter()
            .find(|b| b.kind == "text")
            .map(|b| b.text.as_str())
            .ok_or_else(|| anyhow!("comparator response has no text block"))?;

        parse_comparison(text).ok_or_else(|| anyhow!("unparseable comparator verdict"))
    }

    fn provider_name(&self) -> &'static str {
        "anthropic"
    }
}

/// Always fails; with the fail-closed resolver this means "never merge via LLM".
pub struct DisabledComparator;

#[async_trait]
impl EventComparator for DisabledComparator {
    async fn compare(&self, _: &str, _: &str, _: &str, _: &str) -> Result<Comparison> {
        Err(anyhow!("comparator disabled"))
    }

    fn provider_name(&self) -> &'static str {
        "disabled"
    }
}

/// Returns the same verdict for every pair and counts calls.
#[derive(Debug)]
pub struct FixedComparator {
    verdict: Comparison,
    calls: AtomicUsize,
}

impl FixedComparator {
    pub fn new(verdict: Comparison) -> Self {
        Self {
            verdict,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventComparator for FixedComparator {
    async fn compare(&self, _: &str, _: &str, _: &str, _: &str) -> Result<Comparison> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.verdict)
    }

    fn provider_name(&self) -> &'static str {
        "fixed"
    }
}

// ------------------------------------------------------------
// Prompt + parsing
// ------------------------------------------------------------

fn build_prompt(title_a: &str, summary_a: &str, title_b: &str, summary_b: &str) -> String {
    let or_na = |s: &str| {
        if s.trim().is_empty() {
            "Not available".to_string()
        } else {
            s.trim().to_string()
        }
    };
    format!(
        "Decide whether these two articles report the SAME specific event or news item.\n\n\
         Article 1:\nTitle: {}\nSummary: {}\n\n\
         Article 2:\nTitle: {}\nSummary: {}\n\n\
         Answer ONLY with JSON:\n{{\"sameEvent\": true|false, \"confidence\": <0.0 to 1.0>}}\n\n\
         sameEvent=true only if both cover the same event, announcement or incident.\n\
         sameEvent=false if they are related topics but distinct events.",
        title_a.trim(),
        or_na(summary_a),
        title_b.trim(),
        or_na(summary_b)
    )
}

static RE_CODE_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"```(?:json)?\s*\n?([\s\S]*?)\n?\s*```").expect("code fence regex")
});

/// Parse a comparator reply, tolerating Markdown fences, surrounding prose,
/// snake_case keys and stringly-typed values. `None` when no verdict exists.
pub fn parse_comparison(raw: &str) -> Option<Comparison> {
    let body = match RE_CODE_FENCE.captures(raw).and_then(|c| c.get(1)) {
        Some(m) => m.as_str().trim(),
        None => raw.trim(),
    };

    let value: Value = serde_json::from_str(body).ok().or_else(|| {
        let start = body.find('{')?;
        let end = body.rfind('}')?;
        if end <= start {
            return None;
        }
        serde_json::from_str(&body[start..=end]).ok()
    })?;

    let obj = value.as_object()?;
    let same_event = obj
        .get("sameEvent")
        .or_else(|| obj.get("same_event"))
        .and_then(as_bool)?;
    let confidence = obj
        .get("confidence")
        .and_then(as_f32)
        .filter(|c| c.is_finite())
        .unwrap_or(0.0)
        .clamp(0.0, 1.0);

    Some(Comparison {
        same_event,
        confidence,
    })
}

fn as_bool(v: &Value) -> Option<bool> {
    match v {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" => Some(true),
            "false" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn as_f32(v: &Value) -> Option<f32> {
    match v {
        Value::Number(n) => n.as_f64().map(|f| f as f32),
        Value::String(s) => s.trim().parse::<f32>().ok(),
        _ => None,
    }
}
