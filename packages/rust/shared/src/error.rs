//! Error types for ExamPaper.
//!
//! Library crates use [`ExamPaperError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Data-level outcomes (a rejected candidate, an unparsed classifier slot)
//! are modelled as values elsewhere and never appear here.

use std::fmt;
use std::path::PathBuf;

/// Top-level error type for all ExamPaper operations.
#[derive(Debug, thiserror::Error)]
pub enum ExamPaperError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error while talking to a collaborator.
    #[error("network error: {0}")]
    Network(String),

    /// Malformed input that could not be parsed.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Text-generation or classification backend error.
    #[error("llm error: {0}")]
    Llm(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (empty document, bad input file, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// A pipeline stage produced nothing for the next stage to work with.
    #[error("no {0}")]
    EmptyStage(PipelineStage),

    /// The paper assembler could not produce a paper.
    #[error(transparent)]
    Assembly(#[from] AssemblyError),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ExamPaperError>;

impl ExamPaperError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline stages
// ---------------------------------------------------------------------------

/// Pipeline stages that can come up empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Chunking,
    Generation,
    Validation,
    Classification,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::Chunking => "text chunks could be produced from the source",
            Self::Generation => "questions could be generated from the source",
            Self::Validation => "questions passed validation",
            Self::Classification => "questions could be classified with a cognitive level",
        };
        f.write_str(msg)
    }
}

// ---------------------------------------------------------------------------
// Assembly errors
// ---------------------------------------------------------------------------

/// Why the paper assembler refused or failed a request.
///
/// Each variant is distinct so callers can decide whether relaxing the
/// request (lower target, different tiers) is worth a retry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssemblyError {
    /// Target score was zero or negative.
    #[error("target score must be positive (got {0})")]
    NonPositiveTarget(i64),

    /// No pooled question has a score on one of the configured tiers.
    #[error("no eligible questions in the pool")]
    EmptyPool,

    /// No combination of available tier counts sums to the target.
    #[error("cannot reach exact target of {target} marks from the available questions")]
    Infeasible { target: i64 },

    /// The tier table itself is unusable (zero or repeated tier scores).
    #[error("invalid tier table: {0}")]
    InvalidTiers(String),
}
