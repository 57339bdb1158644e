//! Run diagnostics for one paper generation.

use std::collections::BTreeMap;

use serde::Serialize;

use exampaper_classify::AttemptStats;
use exampaper_ingest::TextChunk;
use exampaper_shared::{CognitiveLabel, LabeledQuestion, RejectionRecord};

/// Chunk word counts kept in the report.
const CHUNK_SAMPLE: usize = 10;

/// Example texts kept per rejection reason.
const EXAMPLES_PER_REASON: usize = 2;

/// Reasons listed in `top_rejections`.
const TOP_REASONS: usize = 3;

/// How many candidates were rejected for one reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReasonCount {
    pub reason: String,
    pub count: usize,
}

/// Counters collected stage by stage through the pipeline.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub raw_text_chars: usize,
    pub raw_text_words: usize,
    pub keyword_count: usize,

    pub chunks_created: usize,
    /// Word counts of the first few chunks.
    pub chunk_word_counts: Vec<usize>,

    pub raw_questions_generated: usize,
    /// Chunk id → questions generated from it.
    pub raw_questions_per_chunk: BTreeMap<usize, usize>,
    /// Chunks whose generator call failed.
    pub generation_failures: usize,

    pub accepted_questions: usize,
    pub rejected_questions: usize,
    pub rejection_reasons_count: BTreeMap<String, usize>,
    pub rejection_examples: BTreeMap<String, Vec<String>>,
    pub top_rejections: Vec<ReasonCount>,

    pub classification_attempts: Vec<AttemptStats>,
    pub classification_calls: usize,
    pub classified: usize,
    pub classification_failed: usize,

    pub bank_size_total: usize,
    pub bank_by_label: BTreeMap<CognitiveLabel, usize>,
    pub bank_by_score: BTreeMap<u32, usize>,

    pub target_score: i64,
    pub selected_questions: usize,
}

impl RunReport {
    pub fn record_source(&mut self, text: &str) {
        self.raw_text_chars = text.chars().count();
        self.raw_text_words = text.split_whitespace().count();
    }

    pub fn record_chunks(&mut self, chunks: &[TextChunk]) {
        self.chunks_created = chunks.len();
        self.chunk_word_counts = chunks
            .iter()
            .take(CHUNK_SAMPLE)
            .map(|chunk| chunk.word_count)
            .collect();
    }

    pub fn record_generated(&mut self, chunk_id: usize, count: usize) {
        self.raw_questions_per_chunk.insert(chunk_id, count);
        self.raw_questions_generated += count;
    }

    pub fn record_rejections(&mut self, rejected: &[RejectionRecord]) {
        self.rejected_questions = rejected.len();

        for record in rejected {
            let reason = record.reason.to_string();
            *self.rejection_reasons_count.entry(reason.clone()).or_default() += 1;

            let examples = self.rejection_examples.entry(reason).or_default();
            if examples.len() < EXAMPLES_PER_REASON {
                examples.push(record.text.clone());
            }
        }

        let mut ranked: Vec<ReasonCount> = self
            .rejection_reasons_count
            .iter()
            .map(|(reason, &count)| ReasonCount {
                reason: reason.clone(),
                count,
            })
            .collect();
        ranked.sort_by(|a, b| b.count.cmp(&a.count));
        ranked.truncate(TOP_REASONS);
        self.top_rejections = ranked;
    }

    pub fn record_classification(
        &mut self,
        attempts: Vec<AttemptStats>,
        classified: usize,
        failed: usize,
    ) {
        self.classification_calls = attempts.iter().map(|a| a.calls).sum();
        self.classification_attempts = attempts;
        self.classified = classified;
        self.classification_failed = failed;
    }

    pub fn record_bank(&mut self, bank: &[LabeledQuestion]) {
        self.bank_size_total = bank.len();
        self.bank_by_label.clear();
        self.bank_by_score.clear();
        for question in bank {
            *self.bank_by_label.entry(question.label()).or_default() += 1;
            *self.bank_by_score.entry(question.score()).or_default() += 1;
        }
    }

    /// `reason=count` pairs for a one-line log summary.
    pub fn top_rejections_text(&self) -> String {
        if self.top_rejections.is_empty() {
            return "none".into();
        }
        self.top_rejections
            .iter()
            .map(|r| format!("{}={}", r.reason, r.count))
            .collect::<Vec<_>>()
            .join(", ")
    }
}
