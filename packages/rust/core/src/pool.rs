//! Loading a pre-labeled question pool from JSON.
//!
//! Lets a stored question bank be assembled without any generation or
//! classification calls.

use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use exampaper_shared::{CognitiveLabel, ExamPaperError, LabeledQuestion, Result, ScoreTable};

/// One entry of a pool file. `score` falls back to the label's weight.
#[derive(Debug, Clone, Deserialize)]
pub struct PoolEntry {
    pub text: String,
    pub label: CognitiveLabel,
    #[serde(default)]
    pub score: Option<u32>,
    #[serde(default, alias = "verb")]
    pub label_verb: Option<String>,
    #[serde(default)]
    pub source_unit_id: Option<usize>,
}

impl PoolEntry {
    pub fn into_labeled(self, scores: &ScoreTable) -> LabeledQuestion {
        let score = self.score.unwrap_or_else(|| scores.score(self.label));
        LabeledQuestion::new(self.text, self.source_unit_id, self.label, self.label_verb, score)
    }
}

/// Parse a JSON array of [`PoolEntry`] values.
pub fn parse_pool(json: &str, scores: &ScoreTable) -> Result<Vec<LabeledQuestion>> {
    let entries: Vec<PoolEntry> = serde_json::from_str(json)
        .map_err(|e| ExamPaperError::parse(format!("invalid question pool: {e}")))?;

    let pool: Vec<LabeledQuestion> = entries
        .into_iter()
        .filter(|entry| !entry.text.trim().is_empty())
        .map(|entry| entry.into_labeled(scores))
        .collect();

    debug!(questions = pool.len(), "question pool parsed");
    Ok(pool)
}

/// Read and parse a pool file.
pub fn load_pool(path: &Path, scores: &ScoreTable) -> Result<Vec<LabeledQuestion>> {
    let json = std::fs::read_to_string(path).map_err(|e| ExamPaperError::io(path, e))?;
    parse_pool(&json, scores)
}

#[cfg(test)]
mod tests {
    use super::*;
    use exampaper_shared::LabelsConfig;

    fn scores() -> ScoreTable {
        LabelsConfig::default().score_table().unwrap()
    }

    #[test]
    fn test_score_defaults_to_label_weight() {
        let json = r#"[
            {"text": "Define a socket.", "label": "Remember"},
            {"text": "Design a protocol.", "label": "Create", "score": 5, "verb": "design"}
        ]"#;
        let pool = parse_pool(json, &scores()).unwrap();
        assert_eq!(pool[0].score(), 2);
        assert_eq!(pool[1].score(), 5);
        assert_eq!(pool[1].label_verb(), Some("design"));
    }

    #[test]
    fn test_unknown_label_is_parse_error() {
        let json = r#"[{"text": "Define a socket.", "label": "Memorize"}]"#;
        let err = parse_pool(json, &scores()).unwrap_err();
        assert!(matches!(err, ExamPaperError::Parse { .. }));
    }

    #[test]
    fn test_load_fixture_pool() {
        let path = Path::new("../../../fixtures/pools/networks-bank.json");
        let pool = load_pool(path, &scores()).unwrap();
        assert_eq!(pool.len(), 15);
        assert!(pool.iter().all(|q| [2, 5, 10].contains(&q.score())));
    }
}
