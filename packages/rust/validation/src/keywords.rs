//! Keyword extraction from source text.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;
use tracing::debug;

use crate::rules::RuleSet;
use crate::tokenizer::{is_upper_cased, tokenize};

/// The bounded set of salient normalized terms from one source text.
///
/// Built once, then only read. Tokens use the same normalization as
/// [`tokenize`], so lookups take tokenizer output directly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct KeywordSet(BTreeSet<String>);

impl KeywordSet {
    pub fn contains(&self, token: &str) -> bool {
        self.0.contains(token)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl FromIterator<String> for KeywordSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Build the keyword set for `text`.
///
/// Stopwords are dropped; a token survives if it is at least
/// `min_keyword_len` characters long, or is upper-cased and at least two
/// characters long. The `keyword_limit` most frequent survivors are kept,
/// ties going to the token seen first.
pub fn build_keyword_set(text: &str, rules: &RuleSet) -> KeywordSet {
    if text.trim().is_empty() {
        return KeywordSet::default();
    }

    // (token, count) in first-seen order.
    let mut counts: Vec<(String, usize)> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for token in tokenize(text) {
        if rules.is_stopword(&token) || !qualifies(&token, rules.min_keyword_len) {
            continue;
        }
        match positions.get(&token) {
            Some(&idx) => counts[idx].1 += 1,
            None => {
                positions.insert(token.clone(), counts.len());
                counts.push((token, 1));
            }
        }
    }

    let distinct = counts.len();
    // Stable sort keeps first-seen order among equal counts.
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts.truncate(rules.keyword_limit);

    debug!(distinct, kept = counts.len(), "keyword set built");

    counts.into_iter().map(|(token, _)| token).collect()
}

fn qualifies(token: &str, min_len: usize) -> bool {
    let len = token.chars().count();
    len >= min_len || (is_upper_cased(token) && len >= 2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use exampaper_shared::ValidationConfig;

    #[test]
    fn keeps_repeated_acronym_and_drops_fillers() {
        let rules = RuleSet::default();
        let text = "The TCP handshake opens a connection. A TCP segment carries the data.";
        let set = build_keyword_set(text, &rules);
        assert!(set.contains("TCP"));
        assert!(!set.contains("tcp"));
        assert!(!set.contains("the"));
        assert!(!set.contains("a"));
        assert!(set.contains("handshake"));
    }

    #[test]
    fn short_lowercase_tokens_are_dropped() {
        let rules = RuleSet::default();
        let set = build_keyword_set("cpu bus ram memory", &rules);
        assert!(!set.contains("cpu"));
        assert!(!set.contains("bus"));
        assert!(set.contains("memory"));
    }

    #[test]
    fn two_letter_acronyms_qualify() {
        let rules = RuleSet::default();
        let set = build_keyword_set("OS scheduling and IO bound jobs", &rules);
        assert!(set.contains("OS"));
        assert!(set.contains("IO"));
    }

    #[test]
    fn limit_keeps_most_frequent_with_first_seen_ties() {
        let config = ValidationConfig {
            keyword_limit: 2,
            ..ValidationConfig::default()
        };
        let rules = RuleSet::from(&config);
        let text = "alpha beta gamma gamma delta beta gamma";
        let set = build_keyword_set(text, &rules);
        // gamma=3, beta=2, alpha=1 and delta=1: the two most frequent win.
        assert_eq!(set.len(), 2);
        assert!(set.contains("gamma"));
        assert!(set.contains("beta"));

        let config = ValidationConfig {
            keyword_limit: 1,
            ..ValidationConfig::default()
        };
        let rules = RuleSet::from(&config);
        let set = build_keyword_set("kernel driver", &rules);
        // Tie: first seen wins.
        assert!(set.contains("kernel"));
        assert!(!set.contains("driver"));
    }

    #[test]
    fn extraction_is_deterministic() {
        let rules = RuleSet::default();
        let text = std::fs::read_to_string("../../../fixtures/syllabus/networks.txt")
            .expect("read syllabus fixture");
        let first = build_keyword_set(&text, &rules);
        let second = build_keyword_set(&text, &rules);
        assert_eq!(first, second);
        assert!(first.len() <= 200);
        assert!(first.contains("TCP"));
        assert!(first.contains("routing"));
    }

    #[test]
    fn empty_text_gives_empty_set() {
        assert!(build_keyword_set("   ", &RuleSet::default()).is_empty());
    }
}
