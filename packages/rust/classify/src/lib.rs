//! Cognitive-level classification.
//!
//! - [`parser`]: defensive decoding of untrusted classifier responses
//! - [`labels`]: label normalization with a configurable synonym table
//! - [`strategy`]: the [`ClassifierStrategy`] seam and the fallback [`ClassifierChain`]
//! - [`heuristic`] / [`llm`]: built-in strategies

pub mod heuristic;
pub mod labels;
pub mod llm;
pub mod parser;
pub mod strategy;

use exampaper_llm::ChatClient;
use exampaper_shared::{AppConfig, Result};

pub use heuristic::HeuristicClassifier;
pub use labels::LabelNormalizer;
pub use llm::{LlmBatchClassifier, LlmSingleClassifier};
pub use parser::{BatchFailure, BatchParse, decode_batch, parse_batch, parse_single};
pub use strategy::{Attempt, AttemptStats, ChainOutcome, ClassifierChain, ClassifierStrategy};

/// The standard chain: batched model call, then the verb heuristic, then
/// one model call per remaining question.
pub fn default_chain(client: ChatClient, config: &AppConfig) -> Result<ClassifierChain> {
    let normalizer = LabelNormalizer::from_config(&config.labels)?;

    Ok(ClassifierChain::new(vec![
        Box::new(LlmBatchClassifier::from_config(
            client.clone(),
            config,
            normalizer.clone(),
        )),
        Box::new(HeuristicClassifier),
        Box::new(LlmSingleClassifier::from_config(client, config, normalizer)),
    ]))
}

/// A chain that never leaves the process.
pub fn offline_chain() -> ClassifierChain {
    ClassifierChain::new(vec![Box::new(HeuristicClassifier)])
}
