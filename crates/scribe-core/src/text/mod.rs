//! Local keyword extraction and tag suggestion. No model calls.

use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;

use regex::Regex;

static NON_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s]").expect("valid non-word regex"));

static SLUG_NON_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w-]").expect("valid slug regex"));

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

const STOPWORDS: &[&str] = &[
    "a", "an", "the", "is", "are", "was", "were", "be", "been", "being", "have", "has", "had",
    "do", "does", "did", "will", "would", "should", "can", "could", "may", "might", "must",
    "and", "but", "or", "nor", "for", "so", "yet", "in", "on", "at", "by", "from", "to", "with",
    "about", "above", "after", "again", "against", "all", "am", "as", "because", "before",
    "below", "between", "both", "during", "each", "few", "further", "here", "how", "i", "if",
    "into", "it", "its", "itself", "just", "me", "more", "most", "my", "myself", "no", "not",
    "now", "of", "off", "once", "only", "other", "our", "ours", "ourselves", "out", "over",
    "own", "same", "she", "he", "him", "her", "his", "hers", "some", "such", "than", "that",
    "their", "theirs", "them", "themselves", "then", "there", "these", "they", "this", "those",
    "through", "too", "under", "until", "up", "very", "we", "what", "when", "where", "which",
    "while", "who", "whom", "why", "you", "your", "yours", "yourself", "yourselves",
];

fn is_stopword(word: &str) -> bool {
    STOPWORDS.contains(&word)
}

/// The `n` most frequent content words of `text`.
///
/// Words are lowercased with punctuation removed. Stopwords and words of two
/// chars or fewer are skipped. Ties keep first-occurrence order.
pub fn extract_keywords(text: &str, n: usize) -> Vec<String> {
    let lowered = text.to_lowercase();
    let cleaned = NON_WORD.replace_all(&lowered, "");

    let mut order: Vec<&str> = Vec::new();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for word in cleaned.split_whitespace() {
        if word.chars().count() <= 2 || is_stopword(word) {
            continue;
        }
        let count = counts.entry(word).or_insert(0);
        if *count == 0 {
            order.push(word);
        }
        *count += 1;
    }

    // Stable sort keeps first-occurrence order among equal counts.
    order.sort_by(|a, b| counts[b].cmp(&counts[a]));
    order.into_iter().take(n).map(str::to_string).collect()
}

/// Slug form of a topic: lowercase, whitespace runs become `-`, other
/// punctuation is dropped.
pub fn slugify(topic: &str) -> String {
    let lowered = topic.trim().to_lowercase();
    let dashed = WHITESPACE_RUN.replace_all(&lowered, "-");
    SLUG_NON_WORD.replace_all(&dashed, "").into_owned()
}

/// Sorted, de-duplicated tags from a topic and its keywords.
pub fn suggest_tags(topic: &str, keywords: &[String]) -> Vec<String> {
    let mut tags = BTreeSet::new();
    let slug = slugify(topic);
    if !slug.is_empty() {
        tags.insert(slug);
    }
    for keyword in keywords {
        tags.insert(keyword.to_lowercase().replace(' ', "-"));
    }
    tags.into_iter().collect()
}
