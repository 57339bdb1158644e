//! Shared types, error model, and configuration for ExamPaper.
//!
//! This crate is the foundation depended on by all other ExamPaper crates.
//! It provides:
//! - [`ExamPaperError`] and [`AssemblyError`]: the unified error types
//! - Domain types ([`CognitiveLabel`], [`CandidateQuestion`], [`LabeledQuestion`], [`Paper`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, LabelsConfig, LlmConfig, PaperConfig, TierScores,
    ValidationConfig, config_dir, config_file_path, init_config, load_config, load_config_from,
    validate_api_key,
};
pub use error::{AssemblyError, ExamPaperError, PipelineStage, Result};
pub use types::{
    CURRENT_SCHEMA_VERSION, CandidateQuestion, Classification, CognitiveLabel, LabeledQuestion,
    Paper, PaperDocument, PaperId, PaperItem, RejectionReason, RejectionRecord, ScoreTable,
    TierCounts, ValidatedQuestion, sha256_hex,
};
