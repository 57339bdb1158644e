//! Application configuration for ExamPaper.
//!
//! User config lives at `~/.exampaper/exampaper.toml`.
//! CLI flags override config file values, which override defaults.
//!
//! Every hand-tuned table the pipeline relies on (forbidden phrases,
//! stopwords, fallback vocabulary, label synonyms, score weights, tiers)
//! lives here so it can be swapped without touching the components that
//! consume it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ExamPaperError, Result};
use crate::types::{CognitiveLabel, ScoreTable};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "exampaper.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".exampaper";

// ---------------------------------------------------------------------------
// Config structs (matching exampaper.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Text-generation / classification backend.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Validation rule tables.
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Label synonyms and score weights.
    #[serde(default)]
    pub labels: LabelsConfig,

    /// Paper shape.
    #[serde(default)]
    pub paper: PaperConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Target paper total.
    #[serde(default = "default_total_score")]
    pub total_score: i64,

    /// Smallest chunk the chunker will emit (except for short documents).
    #[serde(default = "default_chunk_min_words")]
    pub chunk_min_words: usize,

    /// Largest chunk the chunker will emit.
    #[serde(default = "default_chunk_max_words")]
    pub chunk_max_words: usize,

    /// Words shared between consecutive chunks.
    #[serde(default = "default_chunk_overlap_words")]
    pub chunk_overlap_words: usize,

    /// Questions sent per batch classification call.
    #[serde(default = "default_classify_batch_size")]
    pub classify_batch_size: usize,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            total_score: default_total_score(),
            chunk_min_words: default_chunk_min_words(),
            chunk_max_words: default_chunk_max_words(),
            chunk_overlap_words: default_chunk_overlap_words(),
            classify_batch_size: default_classify_batch_size(),
        }
    }
}

fn default_total_score() -> i64 {
    50
}
fn default_chunk_min_words() -> usize {
    500
}
fn default_chunk_max_words() -> usize {
    800
}
fn default_chunk_overlap_words() -> usize {
    100
}
fn default_classify_batch_size() -> usize {
    15
}

/// `[llm]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Base URL of an OpenAI-compatible API.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Model used for question generation.
    #[serde(default = "default_model")]
    pub generation_model: String,

    /// Model used for cognitive-level classification.
    #[serde(default = "default_model")]
    pub classification_model: String,

    #[serde(default = "default_generation_temperature")]
    pub generation_temperature: f32,

    #[serde(default = "default_classification_temperature")]
    pub classification_temperature: f32,

    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            api_base: default_api_base(),
            generation_model: default_model(),
            classification_model: default_model(),
            generation_temperature: default_generation_temperature(),
            classification_temperature: default_classification_temperature(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_api_base() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_generation_temperature() -> f32 {
    0.3
}
fn default_classification_temperature() -> f32 {
    0.1
}
fn default_timeout_secs() -> u64 {
    60
}

/// `[validation]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Lower-case phrases that reject a question outright. Checked in order.
    #[serde(default = "default_forbidden_phrases")]
    pub forbidden_phrases: Vec<String>,

    /// Generic technical nouns accepted when the keyword set has no overlap.
    #[serde(default = "default_fallback_terms")]
    pub fallback_terms: Vec<String>,

    /// Words never admitted into a keyword set.
    #[serde(default = "default_stopwords")]
    pub stopwords: Vec<String>,

    /// Minimum number of words longer than two characters.
    #[serde(default = "default_min_meaningful_words")]
    pub min_meaningful_words: usize,

    /// Keyword set size bound.
    #[serde(default = "default_keyword_limit")]
    pub keyword_limit: usize,

    /// Minimum length of a non-acronym keyword.
    #[serde(default = "default_min_keyword_len")]
    pub min_keyword_len: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            forbidden_phrases: default_forbidden_phrases(),
            fallback_terms: default_fallback_terms(),
            stopwords: default_stopwords(),
            min_meaningful_words: default_min_meaningful_words(),
            keyword_limit: default_keyword_limit(),
            min_keyword_len: default_min_keyword_len(),
        }
    }
}

fn strings(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| (*w).to_string()).collect()
}

fn default_forbidden_phrases() -> Vec<String> {
    strings(&["zero", "unlike", "therefore", "pham", "something", "any question"])
}
fn default_fallback_terms() -> Vec<String> {
    strings(&[
        "algorithm",
        "data",
        "structure",
        "database",
        "network",
        "protocol",
        "system",
        "software",
        "hardware",
        "api",
        "programming",
        "security",
    ])
}
fn default_stopwords() -> Vec<String> {
    strings(&[
        "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "he", "in", "is",
        "it", "its", "of", "on", "that", "the", "to", "was", "were", "will", "with", "you",
        "your", "we", "our", "they", "their", "this", "these", "those", "or", "if", "then",
        "than", "but", "not", "can", "could", "should", "would", "may", "might", "do", "does",
        "did", "what", "which", "who", "whom", "why", "how", "when", "where", "so", "such",
        "about", "into", "over", "under", "between", "within", "without", "because", "while",
        "also", "there", "here", "all", "any", "some", "no", "yes", "one", "two", "three",
        "more", "most", "much", "many", "each", "every", "other", "another", "same", "new",
        "old", "use", "used", "using", "useful", "example", "examples", "define", "definition",
    ])
}
fn default_min_meaningful_words() -> usize {
    6
}
fn default_keyword_limit() -> usize {
    200
}
fn default_min_keyword_len() -> usize {
    4
}

/// `[labels]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelsConfig {
    /// Lower-case alias → canonical label name.
    #[serde(default = "default_synonyms")]
    pub synonyms: BTreeMap<String, String>,

    /// Canonical label name → score weight.
    #[serde(default = "default_weights")]
    pub weights: BTreeMap<String, u32>,
}

impl Default for LabelsConfig {
    fn default() -> Self {
        Self {
            synonyms: default_synonyms(),
            weights: default_weights(),
        }
    }
}

impl LabelsConfig {
    /// Resolve the weight table into a [`ScoreTable`].
    pub fn score_table(&self) -> Result<ScoreTable> {
        ScoreTable::from_weights(&parse_label_keys(&self.weights)?)
    }

    /// Resolve synonyms into typed labels (aliases lower-cased).
    pub fn synonym_table(&self) -> Result<BTreeMap<String, CognitiveLabel>> {
        self.synonyms
            .iter()
            .map(|(alias, label)| Ok((alias.trim().to_lowercase(), label.parse()?)))
            .collect()
    }
}

fn default_synonyms() -> BTreeMap<String, String> {
    [
        ("remembering", "Remember"),
        ("recall", "Remember"),
        ("recalling", "Remember"),
        ("knowledge", "Remember"),
        ("understanding", "Understand"),
        ("comprehension", "Understand"),
        ("comprehend", "Understand"),
        ("applying", "Apply"),
        ("application", "Apply"),
        ("analyzing", "Analyze"),
        ("analysing", "Analyze"),
        ("analyse", "Analyze"),
        ("analysis", "Analyze"),
        ("evaluating", "Evaluate"),
        ("evaluation", "Evaluate"),
        ("creating", "Create"),
        ("creation", "Create"),
        ("synthesis", "Create"),
        ("synthesize", "Create"),
    ]
    .into_iter()
    .map(|(alias, label)| (alias.to_string(), label.to_string()))
    .collect()
}

fn default_weights() -> BTreeMap<String, u32> {
    [
        ("Remember", 2),
        ("Understand", 2),
        ("Apply", 5),
        ("Analyze", 5),
        ("Evaluate", 10),
        ("Create", 10),
    ]
    .into_iter()
    .map(|(label, score)| (label.to_string(), score))
    .collect()
}

/// `[paper]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperConfig {
    /// Canonical label name → requested fraction. Need not sum to 1.
    #[serde(default = "default_distribution")]
    pub distribution: BTreeMap<String, f64>,

    /// Score tiers the assembler searches over.
    #[serde(default)]
    pub tiers: TierScores,
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            distribution: default_distribution(),
            tiers: TierScores::default(),
        }
    }
}

impl PaperConfig {
    /// Resolve the distribution into typed labels. Unlisted labels are absent (0).
    pub fn label_distribution(&self) -> Result<BTreeMap<CognitiveLabel, f64>> {
        let parsed = parse_label_keys(&self.distribution)?;
        if let Some((label, frac)) = parsed.iter().find(|(_, f)| !f.is_finite() || **f < 0.0) {
            return Err(ExamPaperError::config(format!(
                "distribution fraction for {label} must be a non-negative number (got {frac})"
            )));
        }
        Ok(parsed)
    }
}

/// 40% of marks on 2-mark labels, 40% on 5-mark labels, 20% on 10-mark labels.
fn default_distribution() -> BTreeMap<String, f64> {
    [
        ("Remember", 0.2),
        ("Understand", 0.2),
        ("Apply", 0.25),
        ("Analyze", 0.15),
        ("Evaluate", 0.1),
        ("Create", 0.1),
    ]
    .into_iter()
    .map(|(label, frac)| (label.to_string(), frac))
    .collect()
}

/// `[paper.tiers]`: the three score values questions can be worth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierScores {
    #[serde(default = "default_light")]
    pub light: u32,
    #[serde(default = "default_medium")]
    pub medium: u32,
    #[serde(default = "default_heavy")]
    pub heavy: u32,
}

impl Default for TierScores {
    fn default() -> Self {
        Self {
            light: default_light(),
            medium: default_medium(),
            heavy: default_heavy(),
        }
    }
}

fn default_light() -> u32 {
    2
}
fn default_medium() -> u32 {
    5
}
fn default_heavy() -> u32 {
    10
}

fn parse_label_keys<V: Copy>(map: &BTreeMap<String, V>) -> Result<BTreeMap<CognitiveLabel, V>> {
    map.iter()
        .map(|(name, value)| Ok((name.parse::<CognitiveLabel>()?, *value)))
        .collect()
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.exampaper/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ExamPaperError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.exampaper/exampaper.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ExamPaperError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        ExamPaperError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ExamPaperError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ExamPaperError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ExamPaperError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Check that the API key env var is set and non-empty, returning its value.
pub fn validate_api_key(config: &AppConfig) -> Result<String> {
    let var_name = &config.llm.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(ExamPaperError::config(format!(
            "API key not found. Set the {var_name} environment variable."
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("total_score"));
        assert!(toml_str.contains("OPENAI_API_KEY"));
        assert!(toml_str.contains("forbidden_phrases"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.defaults.total_score, 50);
        assert_eq!(parsed.defaults.classify_batch_size, 15);
        assert_eq!(parsed.validation.keyword_limit, 200);
        assert_eq!(parsed.paper.tiers, TierScores::default());
        assert_eq!(parsed.labels.weights.len(), 6);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[defaults]
total_score = 40

[validation]
forbidden_phrases = ["lorem"]

[paper.tiers]
heavy = 8
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.defaults.total_score, 40);
        assert_eq!(config.defaults.chunk_max_words, 800);
        assert_eq!(config.validation.forbidden_phrases, vec!["lorem".to_string()]);
        assert_eq!(config.validation.min_meaningful_words, 6);
        assert_eq!(config.paper.tiers.light, 2);
        assert_eq!(config.paper.tiers.heavy, 8);
    }

    #[test]
    fn score_table_from_defaults() {
        let table = LabelsConfig::default().score_table().expect("score table");
        assert_eq!(table.score(CognitiveLabel::Remember), 2);
        assert_eq!(table.score(CognitiveLabel::Analyze), 5);
        assert_eq!(table.score(CognitiveLabel::Create), 10);
    }

    #[test]
    fn unknown_label_in_weights_is_rejected() {
        let mut labels = LabelsConfig::default();
        labels.weights.insert("Memorize".into(), 1);
        assert!(labels.score_table().is_err());
    }

    #[test]
    fn synonym_table_is_typed() {
        let table = LabelsConfig::default().synonym_table().expect("synonyms");
        assert_eq!(table.get("analysis"), Some(&CognitiveLabel::Analyze));
        assert_eq!(table.get("synthesis"), Some(&CognitiveLabel::Create));
    }

    #[test]
    fn distribution_rejects_negative_fraction() {
        let mut paper = PaperConfig::default();
        paper.distribution.insert("Create".into(), -0.1);
        let err = paper.label_distribution().unwrap_err();
        assert!(err.to_string().contains("Create"));
    }

    #[test]
    fn api_key_validation() {
        let mut config = AppConfig::default();
        // Use a unique env var name to avoid interfering with other tests
        config.llm.api_key_env = "EXAMPAPER_TEST_NONEXISTENT_KEY_12345".into();
        let result = validate_api_key(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("API key not found"));
    }
}
