//! Rule-based question validation and keyword extraction.
//!
//! Decides, with no model involvement, whether a generated question is
//! admissible. Three rules run in a fixed order and the first failure is
//! the reported reason:
//! 1. forbidden phrases (`forbidden_word:<phrase>`)
//! 2. minimum meaningful words (`too_short`)
//! 3. overlap with the source keyword set or fallback vocabulary
//!    (`no_keyword_overlap`)
//!
//! Everything here is pure and deterministic; the same inputs always give
//! the same accepted/rejected sequences.

pub mod keywords;
pub mod rules;
pub mod tokenizer;

use serde::Serialize;
use tracing::{debug, info, instrument};

use exampaper_shared::{CandidateQuestion, RejectionRecord, ValidatedQuestion};

pub use keywords::{KeywordSet, build_keyword_set};
pub use rules::RuleSet;
pub use tokenizer::tokenize;

/// Result of validating one batch of candidates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationOutcome {
    /// Accepted questions, in input order.
    pub accepted: Vec<ValidatedQuestion>,
    /// One record per rejected candidate, in input order.
    pub rejected: Vec<RejectionRecord>,
}

/// Validate a batch of candidates against the rules and an optional keyword set.
///
/// A missing or empty keyword set leaves only the fallback vocabulary for
/// the grounding rule. No reordering, no deduplication.
#[instrument(skip_all, fields(candidates = candidates.len()))]
pub fn validate(
    candidates: &[CandidateQuestion],
    keywords: Option<&KeywordSet>,
    rules: &RuleSet,
) -> ValidationOutcome {
    let mut outcome = ValidationOutcome::default();

    for candidate in candidates {
        match rules.first_violation(&candidate.text, keywords) {
            None => outcome
                .accepted
                .push(ValidatedQuestion::accepted(candidate.clone())),
            Some(reason) => {
                debug!(%reason, text = %candidate.text, "candidate rejected");
                outcome.rejected.push(RejectionRecord {
                    text: candidate.text.clone(),
                    source_unit_id: candidate.source_unit_id,
                    reason,
                });
            }
        }
    }

    info!(
        accepted = outcome.accepted.len(),
        rejected = outcome.rejected.len(),
        "validation complete"
    );

    outcome
}
