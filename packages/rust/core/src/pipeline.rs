//! End-to-end `generate` pipeline: source text → chunks → questions →
//! validation → classification → paper.

use std::time::Instant;

use tracing::{info, instrument, warn};

use exampaper_classify::ClassifierChain;
use exampaper_ingest::{ChunkOptions, QuestionGenerator, chunk_text};
use exampaper_shared::{
    AppConfig, AssemblyError, CandidateQuestion, ExamPaperError, LabeledQuestion, PaperDocument,
    PipelineStage, Result,
};
use exampaper_validation::{RuleSet, build_keyword_set, validate};

use crate::assembler::{AssemblyRequest, PaperAssembler};
use crate::report::RunReport;

/// Output of a successful run.
#[derive(Debug, Clone)]
pub struct PaperRun {
    pub document: PaperDocument,
    pub report: RunReport,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after each chunk's questions come back.
    fn chunk_generated(&self, current: usize, total: usize, questions: usize);
    /// Called when the pipeline completes.
    fn done(&self, report: &RunReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn chunk_generated(&self, _current: usize, _total: usize, _questions: usize) {}
    fn done(&self, _report: &RunReport) {}
}

/// Run the full pipeline over one source text.
///
/// 1. Keyword set from the whole source
/// 2. Chunk into word windows
/// 3. Generate candidates, chunk by chunk in order
/// 4. Validate against the keyword set
/// 5. Classify through the strategy chain, promote labeled questions
/// 6. Assemble an exact-total paper
///
/// Any stage that leaves nothing for the next one ends the run with
/// [`ExamPaperError::EmptyStage`].
#[instrument(
    skip_all,
    fields(source_chars = source_text.len(), target = config.defaults.total_score)
)]
pub async fn generate_paper(
    config: &AppConfig,
    source_text: &str,
    generator: &dyn QuestionGenerator,
    chain: &ClassifierChain,
    progress: &dyn ProgressReporter,
) -> Result<PaperRun> {
    let start = Instant::now();
    let target = config.defaults.total_score;

    // Configuration problems surface before any backend is called.
    if target <= 0 {
        return Err(AssemblyError::NonPositiveTarget(target).into());
    }
    let scores = config.labels.score_table()?;
    let distribution = config.paper.label_distribution()?;
    let assembler = PaperAssembler::new(config.paper.tiers)?;
    let rules = RuleSet::from(&config.validation);

    let mut report = RunReport {
        target_score: target,
        ..RunReport::default()
    };
    report.record_source(source_text);

    // --- Phase 1: Keywords ---
    progress.phase("Extracting keywords");
    let keywords = build_keyword_set(source_text, &rules);
    report.keyword_count = keywords.len();

    // --- Phase 2: Chunking ---
    progress.phase("Chunking source text");
    let chunks = chunk_text(source_text, ChunkOptions::from(&config.defaults));
    report.record_chunks(&chunks);
    if chunks.is_empty() {
        return Err(ExamPaperError::EmptyStage(PipelineStage::Chunking));
    }

    // --- Phase 3: Generation ---
    progress.phase("Generating questions");
    let mut candidates: Vec<CandidateQuestion> = Vec::new();
    let total_chunks = chunks.len();
    for (i, chunk) in chunks.iter().enumerate() {
        let batch = match generator.generate(chunk).await {
            Ok(batch) => batch,
            Err(e) => {
                warn!(chunk = chunk.id, error = %e, "question generation failed for chunk");
                report.generation_failures += 1;
                Vec::new()
            }
        };
        report.record_generated(chunk.id, batch.len());
        progress.chunk_generated(i + 1, total_chunks, batch.len());
        candidates.extend(batch);
    }
    if candidates.is_empty() {
        return Err(ExamPaperError::EmptyStage(PipelineStage::Generation));
    }

    // --- Phase 4: Validation ---
    progress.phase("Validating questions");
    let outcome = validate(&candidates, Some(&keywords), &rules);
    report.accepted_questions = outcome.accepted.len();
    report.record_rejections(&outcome.rejected);

    info!(
        chunks = report.chunks_created,
        raw_generated = report.raw_questions_generated,
        accepted = report.accepted_questions,
        rejected = report.rejected_questions,
        top_rejections = %report.top_rejections_text(),
        "validation summary"
    );

    if outcome.accepted.is_empty() {
        return Err(ExamPaperError::EmptyStage(PipelineStage::Validation));
    }

    // --- Phase 5: Classification ---
    progress.phase("Classifying questions");
    let texts: Vec<String> = outcome.accepted.iter().map(|q| q.text().to_string()).collect();
    let classified = chain.classify(&texts).await;
    report.record_classification(
        classified.attempts.clone(),
        classified.classified(),
        classified.failed(),
    );

    let bank: Vec<LabeledQuestion> = outcome
        .accepted
        .into_iter()
        .zip(classified.results)
        .filter_map(|(question, result)| result.map(|c| question.promote(c, &scores)))
        .collect();
    report.record_bank(&bank);

    info!(
        calls = report.classification_calls,
        classified = report.classified,
        failed = report.classification_failed,
        "classification summary"
    );

    if bank.is_empty() {
        return Err(ExamPaperError::EmptyStage(PipelineStage::Classification));
    }

    // --- Phase 6: Assembly ---
    progress.phase("Assembling paper");
    let request =
        AssemblyRequest::from_distribution(target, distribution, &scores, assembler.tiers());
    let paper = assembler.assemble(&bank, &request)?;
    report.selected_questions = paper.items.len();

    let document = PaperDocument::new(source_text, paper);
    progress.done(&report);

    info!(
        paper_id = %document.id,
        total_score = document.paper.total_score,
        questions = report.selected_questions,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "generate pipeline complete"
    );

    Ok(PaperRun { document, report })
}
