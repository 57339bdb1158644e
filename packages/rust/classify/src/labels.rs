//! Label normalization: canonical names plus a configurable synonym table.

use std::collections::{BTreeMap, HashMap};

use exampaper_shared::{CognitiveLabel, LabelsConfig, Result};

/// Characters a model tends to wrap a label in.
const LABEL_DECORATION: &[char] = &['"', '\'', '`', '*', '.', ',', ':', ';', '(', ')', '[', ']'];

/// Maps free-form label strings onto [`CognitiveLabel`].
///
/// Matching is exact after trimming decoration and lower-casing: either a
/// canonical name or an alias from the synonym table. Anything else is
/// unknown; no fuzzy matching.
#[derive(Debug, Clone)]
pub struct LabelNormalizer {
    synonyms: HashMap<String, CognitiveLabel>,
}

impl LabelNormalizer {
    pub fn new(synonyms: BTreeMap<String, CognitiveLabel>) -> Self {
        Self {
            synonyms: synonyms
                .into_iter()
                .map(|(alias, label)| (alias.trim().to_lowercase(), label))
                .collect(),
        }
    }

    /// Build from the `[labels]` config section.
    pub fn from_config(config: &LabelsConfig) -> Result<Self> {
        Ok(Self::new(config.synonym_table()?))
    }

    /// Resolve a raw label, or `None` if it is not recognized.
    pub fn normalize(&self, raw: &str) -> Option<CognitiveLabel> {
        let cleaned = raw.trim().trim_matches(LABEL_DECORATION).trim().to_lowercase();
        if cleaned.is_empty() {
            return None;
        }

        CognitiveLabel::ALL
            .into_iter()
            .find(|label| label.as_str().eq_ignore_ascii_case(&cleaned))
            .or_else(|| self.synonyms.get(&cleaned).copied())
    }
}

impl Default for LabelNormalizer {
    fn default() -> Self {
        Self::new(LabelsConfig::default().synonym_table().unwrap_or_default())
    }
}
