//! Core domain types for ExamPaper question banks and papers.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{ExamPaperError, Result};

/// Current schema version for the paper document format.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// CognitiveLabel
// ---------------------------------------------------------------------------

/// One of the six ordered cognitive levels (Bloom's taxonomy).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CognitiveLabel {
    Remember,
    Understand,
    Apply,
    Analyze,
    Evaluate,
    Create,
}

impl CognitiveLabel {
    /// All labels, lowest level first.
    pub const ALL: [CognitiveLabel; 6] = [
        Self::Remember,
        Self::Understand,
        Self::Apply,
        Self::Analyze,
        Self::Evaluate,
        Self::Create,
    ];

    /// Canonical capitalized name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Remember => "Remember",
            Self::Understand => "Understand",
            Self::Apply => "Apply",
            Self::Analyze => "Analyze",
            Self::Evaluate => "Evaluate",
            Self::Create => "Create",
        }
    }

    /// Zero-based position in the taxonomy.
    pub fn rank(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for CognitiveLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CognitiveLabel {
    type Err = ExamPaperError;

    /// Case-insensitive match against the canonical names only.
    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|label| label.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ExamPaperError::parse(format!("unknown cognitive label: {s:?}")))
    }
}

// ---------------------------------------------------------------------------
// ScoreTable
// ---------------------------------------------------------------------------

/// Fixed label → score weight mapping, applied when a question is labeled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreTable {
    scores: [u32; 6],
}

impl ScoreTable {
    /// Build from a weight map. Every label must be present with a non-zero score.
    pub fn from_weights(weights: &BTreeMap<CognitiveLabel, u32>) -> Result<Self> {
        let mut scores = [0u32; 6];
        for label in CognitiveLabel::ALL {
            match weights.get(&label) {
                Some(&score) if score > 0 => scores[label.rank()] = score,
                Some(_) => {
                    return Err(ExamPaperError::config(format!(
                        "score weight for {label} must be positive"
                    )));
                }
                None => {
                    return Err(ExamPaperError::config(format!(
                        "missing score weight for {label}"
                    )));
                }
            }
        }
        Ok(Self { scores })
    }

    /// Score awarded to a question of this level.
    pub fn score(&self, label: CognitiveLabel) -> u32 {
        self.scores[label.rank()]
    }

    /// Labels whose weight equals `score`.
    pub fn labels_with_score(&self, score: u32) -> impl Iterator<Item = CognitiveLabel> + '_ {
        CognitiveLabel::ALL
            .into_iter()
            .filter(move |label| self.score(*label) == score)
    }
}

// ---------------------------------------------------------------------------
// Question lifecycle
// ---------------------------------------------------------------------------

/// A raw question produced by the generator. Never trusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateQuestion {
    /// Question wording (trimmed).
    pub text: String,
    /// Index of the source chunk the question was generated from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_unit_id: Option<usize>,
}

impl CandidateQuestion {
    pub fn new(text: impl AsRef<str>, source_unit_id: Option<usize>) -> Self {
        Self {
            text: text.as_ref().trim().to_string(),
            source_unit_id,
        }
    }
}

/// A candidate that passed validation but has no cognitive level yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidatedQuestion {
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_unit_id: Option<usize>,
}

impl ValidatedQuestion {
    /// Promote a candidate that passed every validation rule.
    pub fn accepted(candidate: CandidateQuestion) -> Self {
        Self {
            text: candidate.text,
            source_unit_id: candidate.source_unit_id,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn source_unit_id(&self) -> Option<usize> {
        self.source_unit_id
    }

    /// Attach a classification, consuming the unlabeled question.
    ///
    /// This is the only way to obtain a [`LabeledQuestion`] from a
    /// validated one, so a question is labeled at most once.
    pub fn promote(self, classification: Classification, scores: &ScoreTable) -> LabeledQuestion {
        LabeledQuestion {
            text: self.text,
            source_unit_id: self.source_unit_id,
            label: classification.label,
            label_verb: classification.verb,
            score: scores.score(classification.label),
        }
    }
}

/// Output of one classifier for one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub label: CognitiveLabel,
    /// Main cognitive verb, when the classifier reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verb: Option<String>,
    /// Classifier confidence in `[0, 1]`.
    pub confidence: f32,
}

impl Classification {
    pub fn new(label: CognitiveLabel, verb: Option<String>, confidence: f32) -> Self {
        Self {
            label,
            verb,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

/// A validated question with its cognitive level and score attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabeledQuestion {
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_unit_id: Option<usize>,
    label: CognitiveLabel,
    #[serde(skip_serializing_if = "Option::is_none")]
    label_verb: Option<String>,
    score: u32,
}

impl LabeledQuestion {
    /// Rebuild a labeled question from stored data (e.g. an exported bank).
    pub fn new(
        text: impl Into<String>,
        source_unit_id: Option<usize>,
        label: CognitiveLabel,
        label_verb: Option<String>,
        score: u32,
    ) -> Self {
        Self {
            text: text.into(),
            source_unit_id,
            label,
            label_verb,
            score,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn source_unit_id(&self) -> Option<usize> {
        self.source_unit_id
    }

    pub fn label(&self) -> CognitiveLabel {
        self.label
    }

    pub fn label_verb(&self) -> Option<&str> {
        self.label_verb.as_deref()
    }

    pub fn score(&self) -> u32 {
        self.score
    }
}

// ---------------------------------------------------------------------------
// Rejections
// ---------------------------------------------------------------------------

/// Why a candidate question was rejected. Exactly one per rejection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RejectionReason {
    /// Text contains a forbidden phrase (the phrase is carried along).
    ForbiddenWord(String),
    /// Fewer meaningful words than the configured minimum.
    TooShort,
    /// No token overlaps the keyword set or the fallback vocabulary.
    NoKeywordOverlap,
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ForbiddenWord(phrase) => write!(f, "forbidden_word:{phrase}"),
            Self::TooShort => f.write_str("too_short"),
            Self::NoKeywordOverlap => f.write_str("no_keyword_overlap"),
        }
    }
}

impl FromStr for RejectionReason {
    type Err = ExamPaperError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "too_short" => Ok(Self::TooShort),
            "no_keyword_overlap" => Ok(Self::NoKeywordOverlap),
            other => other
                .strip_prefix("forbidden_word:")
                .map(|phrase| Self::ForbiddenWord(phrase.to_string()))
                .ok_or_else(|| ExamPaperError::parse(format!("unknown rejection reason: {s:?}"))),
        }
    }
}

impl Serialize for RejectionReason {
    fn serialize<S: serde::Serializer>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RejectionReason {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A rejected candidate and the first rule it failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectionRecord {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_unit_id: Option<usize>,
    pub reason: RejectionReason,
}

// ---------------------------------------------------------------------------
// Paper
// ---------------------------------------------------------------------------

/// Number of questions taken from each score tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierCounts {
    pub light: u32,
    pub medium: u32,
    pub heavy: u32,
}

impl TierCounts {
    pub fn new(light: u32, medium: u32, heavy: u32) -> Self {
        Self {
            light,
            medium,
            heavy,
        }
    }

    /// Sum of absolute per-tier differences.
    pub fn deviation(&self, other: &TierCounts) -> u32 {
        self.light.abs_diff(other.light)
            + self.medium.abs_diff(other.medium)
            + self.heavy.abs_diff(other.heavy)
    }

    pub fn total(&self) -> u32 {
        self.light + self.medium + self.heavy
    }
}

/// Projection of a selected question as it appears on the paper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperItem {
    pub text: String,
    pub score: u32,
    pub label: CognitiveLabel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_verb: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_unit_id: Option<usize>,
}

impl From<&LabeledQuestion> for PaperItem {
    fn from(q: &LabeledQuestion) -> Self {
        Self {
            text: q.text.clone(),
            score: q.score,
            label: q.label,
            label_verb: q.label_verb.clone(),
            source_unit_id: q.source_unit_id,
        }
    }
}

/// The assembled examination paper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paper {
    /// Always equals the sum of item scores.
    pub total_score: u32,
    pub items: Vec<PaperItem>,
    /// Label → fraction the caller asked for.
    pub requested_distribution: BTreeMap<CognitiveLabel, f64>,
    /// Label → fraction of `total_score` actually selected.
    pub realized_distribution: BTreeMap<CognitiveLabel, f64>,
    /// Questions taken per tier.
    pub tier_counts: TierCounts,
}

// ---------------------------------------------------------------------------
// PaperId / PaperDocument
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for paper identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaperId(pub Uuid);

impl PaperId {
    /// Generate a new time-sortable paper identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for PaperId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PaperId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PaperId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// The JSON envelope written for every generated paper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperDocument {
    /// Schema version for forward compatibility.
    pub schema_version: u32,
    pub id: PaperId,
    pub generated_at: DateTime<Utc>,
    /// SHA-256 of the source text the paper was generated from.
    pub source_sha256: String,
    pub paper: Paper,
    /// Run diagnostics (only when requested).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<serde_json::Value>,
}

impl PaperDocument {
    pub fn new(source_text: &str, paper: Paper) -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            id: PaperId::new(),
            generated_at: Utc::now(),
            source_sha256: sha256_hex(source_text),
            paper,
            report: None,
        }
    }
}

/// Hex-encoded SHA-256 of a string.
pub fn sha256_hex(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}
