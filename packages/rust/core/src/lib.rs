//! Core pipeline orchestration and paper assembly for ExamPaper.
//!
//! This crate ties together keyword extraction, generation, validation,
//! classification, and exact-total assembly into the end-to-end
//! [`generate_paper`] workflow.

pub mod assembler;
pub mod pipeline;
pub mod pool;
pub mod report;

pub use assembler::{AssemblyRequest, PaperAssembler};
pub use pipeline::{PaperRun, ProgressReporter, SilentProgress, generate_paper};
pub use pool::{PoolEntry, load_pool, parse_pool};
pub use report::{ReasonCount, RunReport};
