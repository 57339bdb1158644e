//! Validation rule tables and the three ordered rules.
//!
//! Each rule is a function returning `Some(reason)` on failure. The order in
//! [`RuleSet::first_violation`] is fixed: forbidden content, then minimum
//! substance, then topical grounding.

use std::collections::HashSet;

use exampaper_shared::{RejectionReason, ValidationConfig};

use crate::keywords::KeywordSet;
use crate::tokenizer::tokenize;

/// Characters stripped from both ends of a word before it is counted.
const WORD_PUNCTUATION: &[char] = &['.', ',', ';', ':', '?', '!', '(', ')', '[', ']', '{', '}'];

/// Resolved validation tables, built once from [`ValidationConfig`].
#[derive(Debug, Clone)]
pub struct RuleSet {
    /// Lower-cased forbidden phrases, in priority order.
    pub(crate) forbidden_phrases: Vec<String>,
    /// Lower-cased fallback vocabulary.
    pub(crate) fallback_terms: HashSet<String>,
    /// Lower-cased stopwords.
    pub(crate) stopwords: HashSet<String>,
    pub(crate) min_meaningful_words: usize,
    pub(crate) keyword_limit: usize,
    pub(crate) min_keyword_len: usize,
}

impl From<&ValidationConfig> for RuleSet {
    fn from(config: &ValidationConfig) -> Self {
        let lower = |items: &[String]| -> Vec<String> {
            items
                .iter()
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect()
        };

        Self {
            forbidden_phrases: lower(&config.forbidden_phrases),
            fallback_terms: lower(&config.fallback_terms).into_iter().collect(),
            stopwords: lower(&config.stopwords).into_iter().collect(),
            min_meaningful_words: config.min_meaningful_words,
            keyword_limit: config.keyword_limit,
            min_keyword_len: config.min_keyword_len,
        }
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::from(&ValidationConfig::default())
    }
}

impl RuleSet {
    /// Apply the rules in order and report the first one the text fails.
    pub fn first_violation(
        &self,
        text: &str,
        keywords: Option<&KeywordSet>,
    ) -> Option<RejectionReason> {
        self.check_forbidden(text)
            .or_else(|| self.check_substance(text))
            .or_else(|| self.check_grounding(text, keywords))
    }

    /// Rule 1: reject any text containing a forbidden phrase (substring match).
    pub fn check_forbidden(&self, text: &str) -> Option<RejectionReason> {
        let lowered = text.to_lowercase();
        self.forbidden_phrases
            .iter()
            .find(|phrase| lowered.contains(phrase.as_str()))
            .map(|phrase| RejectionReason::ForbiddenWord(phrase.clone()))
    }

    /// Rule 2: require enough words longer than two characters.
    pub fn check_substance(&self, text: &str) -> Option<RejectionReason> {
        let meaningful = text
            .split_whitespace()
            .map(|word| word.trim_matches(WORD_PUNCTUATION))
            .filter(|word| word.chars().count() > 2)
            .count();

        (meaningful < self.min_meaningful_words).then_some(RejectionReason::TooShort)
    }

    /// Rule 3: require a token shared with the keyword set or the fallback vocabulary.
    pub fn check_grounding(
        &self,
        text: &str,
        keywords: Option<&KeywordSet>,
    ) -> Option<RejectionReason> {
        let tokens = tokenize(text);

        let in_keywords = keywords
            .filter(|set| !set.is_empty())
            .is_some_and(|set| tokens.iter().any(|t| set.contains(t)));
        if in_keywords {
            return None;
        }

        let in_fallback = tokens
            .iter()
            .any(|t| self.fallback_terms.contains(&t.to_lowercase()));
        if in_fallback {
            return None;
        }

        Some(RejectionReason::NoKeywordOverlap)
    }

    pub(crate) fn is_stopword(&self, token: &str) -> bool {
        self.stopwords.contains(&token.to_lowercase())
    }
}
