//! # Similarity Scorer
//! Title normalization, keyword extraction and Jaccard overlap.
//!
//! Pure functions: no state, no I/O, no failure modes.

use once_cell::sync::Lazy;
use std::collections::{BTreeSet, HashSet};

/// Spanish + English function words that carry no event identity.
static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        // es
        "el", "la", "los", "las", "un", "una", "unos", "unas", "de", "del", "en", "con", "por",
        "para", "que", "se", "su", "sus", "al", "es", "y", "o", "a", "ante", "como", "mas",
        "pero", "sin", "sobre", "tras", "entre", "hasta", "desde", "este", "esta", "estos",
        "estas", "fue", "son", "ser", "han", "ha", "lo", "le", "les", "muy", "ya",
        // en
        "the", "an", "and", "or", "of", "in", "on", "for", "to", "with", "from", "by", "at",
        "as", "is", "are", "was", "were", "be", "been", "has", "have", "had", "its", "it",
        "this", "that", "these", "those", "after", "over", "into", "but", "not", "will",
    ]
    .into_iter()
    .collect()
});

/// Lowercase, turn punctuation into whitespace, collapse whitespace, trim.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_was_space = true;
    for ch in text.chars().flat_map(char::to_lowercase) {
        let keep = ch.is_alphanumeric() || ch == '_';
        if keep {
            out.push(ch);
            last_was_space = false;
        } else if !last_was_space {
            out.push(' ');
            last_was_space = true;
        }
    }
    if out.ends_with(' ') {
        out.pop();
    }
    out
}

/// Keyword set of a title: normalized tokens longer than two characters
/// that are not stop words.
pub fn keywords(text: &str) -> BTreeSet<String> {
    normalize(text)
        .split_whitespace()
        .filter(|w| w.chars().count() > 2 && !STOP_WORDS.contains(w))
        .map(str::to_string)
        .collect()
}

/// Jaccard index |A∩B| / |A∪B|, 0.0 when both sets are empty.
pub fn similarity(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f32 {
    let inter = a.intersection(b).count();
    let union = a.len() + b.len() - inter;
    if union == 0 {
        0.0
    } else {
        inter as f32 / union as f32
    }
}

/// Convenience: keyword overlap of two raw titles.
pub fn title_similarity(a: &str, b: &str) -> f32 {
    similarity(&keywords(a), &keywords(b))
}
