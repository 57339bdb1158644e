//! Classifier strategy trait and the ordered fallback chain.

use std::time::Instant;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, instrument, warn};

use exampaper_shared::Classification;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Outcome of one strategy over a slice of questions.
#[derive(Debug, Clone, Default)]
pub struct Attempt {
    /// One entry per input question, in input order. `None` = no label.
    pub results: Vec<Option<Classification>>,
    /// Backend calls spent producing these results.
    pub calls: usize,
}

/// One way of attaching cognitive labels to questions.
///
/// Implementations never fail as a whole: a backend error becomes `None`
/// for the items it affected.
#[async_trait]
pub trait ClassifierStrategy: Send + Sync {
    /// Short name used in logs and run reports.
    fn name(&self) -> &str;

    async fn classify(&self, questions: &[String]) -> Attempt;
}

// ---------------------------------------------------------------------------
// Chain
// ---------------------------------------------------------------------------

/// Per-strategy accounting for one chain run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptStats {
    pub strategy: String,
    /// Questions still unresolved when this strategy ran.
    pub offered: usize,
    pub resolved: usize,
    pub calls: usize,
    pub elapsed_ms: u64,
}

/// Labels for every input question plus the attempts that produced them.
#[derive(Debug, Clone, Default)]
pub struct ChainOutcome {
    pub results: Vec<Option<Classification>>,
    pub attempts: Vec<AttemptStats>,
}

impl ChainOutcome {
    pub fn classified(&self) -> usize {
        self.results.iter().filter(|r| r.is_some()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.classified()
    }
}

/// Strategies tried in order; each sees only the questions its predecessors
/// left unresolved.
pub struct ClassifierChain {
    strategies: Vec<Box<dyn ClassifierStrategy>>,
}

impl ClassifierChain {
    pub fn new(strategies: Vec<Box<dyn ClassifierStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn push(&mut self, strategy: Box<dyn ClassifierStrategy>) {
        self.strategies.push(strategy);
    }

    pub fn names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Run the chain over `questions`, stopping early once every item is labeled.
    #[instrument(skip_all, fields(questions = questions.len(), strategies = self.strategies.len()))]
    pub async fn classify(&self, questions: &[String]) -> ChainOutcome {
        let mut results: Vec<Option<Classification>> = vec![None; questions.len()];
        let mut attempts = Vec::new();

        for strategy in &self.strategies {
            let pending: Vec<usize> = (0..questions.len())
                .filter(|&i| results[i].is_none())
                .collect();
            if pending.is_empty() {
                break;
            }

            let batch: Vec<String> = pending.iter().map(|&i| questions[i].clone()).collect();
            let started = Instant::now();
            let attempt = strategy.classify(&batch).await;
            let elapsed_ms = started.elapsed().as_millis() as u64;

            if attempt.results.len() != batch.len() {
                warn!(
                    strategy = strategy.name(),
                    expected = batch.len(),
                    got = attempt.results.len(),
                    "strategy returned misaligned results"
                );
            }

            let mut resolved = 0;
            for (&slot, result) in pending.iter().zip(attempt.results) {
                if let Some(classification) = result {
                    results[slot] = Some(classification);
                    resolved += 1;
                }
            }

            info!(
                strategy = strategy.name(),
                offered = batch.len(),
                resolved,
                calls = attempt.calls,
                elapsed_ms,
                "classification attempt"
            );

            attempts.push(AttemptStats {
                strategy: strategy.name().to_string(),
                offered: batch.len(),
                resolved,
                calls: attempt.calls,
                elapsed_ms,
            });
        }

        ChainOutcome { results, attempts }
    }
}

impl std::fmt::Debug for ClassifierChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassifierChain")
            .field("strategies", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heuristic::HeuristicClassifier;
    use exampaper_shared::CognitiveLabel;
    use std::sync::Mutex;

    /// Labels questions containing `needle`; records what it was offered.
    struct Keyword {
        needle: &'static str,
        label: CognitiveLabel,
        seen: Mutex<Vec<String>>,
    }

    impl Keyword {
        fn new(needle: &'static str, label: CognitiveLabel) -> Self {
            Self {
                needle,
                label,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ClassifierStrategy for Keyword {
        fn name(&self) -> &str {
            self.needle
        }

        async fn classify(&self, questions: &[String]) -> Attempt {
            self.seen.lock().unwrap().extend(questions.iter().cloned());
            Attempt {
                results: questions
                    .iter()
                    .map(|q| {
                        q.contains(self.needle)
                            .then(|| Classification::new(self.label, None, 0.9))
                    })
                    .collect(),
                calls: 1,
            }
        }
    }

    /// Returns fewer results than asked for.
    struct Short;

    #[async_trait]
    impl ClassifierStrategy for Short {
        fn name(&self) -> &str {
            "short"
        }

        async fn classify(&self, _questions: &[String]) -> Attempt {
            Attempt {
                results: vec![Some(Classification::new(CognitiveLabel::Apply, None, 1.0))],
                calls: 1,
            }
        }
    }

    fn questions() -> Vec<String> {
        vec![
            "Explain routing tables in detail.".into(),
            "What is a subnet mask?".into(),
            "Define a MAC address precisely.".into(),
        ]
    }

    #[tokio::test]
    async fn later_strategies_only_see_unresolved_items() {
        let chain = ClassifierChain::new(vec![
            Box::new(Keyword::new("routing", CognitiveLabel::Analyze)),
            Box::new(HeuristicClassifier),
            Box::new(Keyword::new("subnet", CognitiveLabel::Remember)),
        ]);

        let outcome = chain.classify(&questions()).await;
        let labels: Vec<_> = outcome.results.iter().map(|r| r.as_ref().map(|c| c.label)).collect();
        assert_eq!(
            labels,
            vec![
                Some(CognitiveLabel::Analyze),
                Some(CognitiveLabel::Remember),
                Some(CognitiveLabel::Remember),
            ]
        );

        let offered: Vec<_> = outcome.attempts.iter().map(|a| (a.offered, a.resolved)).collect();
        assert_eq!(offered, vec![(3, 1), (2, 1), (1, 1)]);
        assert_eq!(outcome.classified(), 3);
        assert_eq!(outcome.failed(), 0);
    }

    #[tokio::test]
    async fn chain_stops_when_everything_is_labeled() {
        let last = Keyword::new("never", CognitiveLabel::Create);
        let chain = ClassifierChain::new(vec![
            Box::new(Keyword::new(" ", CognitiveLabel::Understand)),
            Box::new(last),
        ]);
        let outcome = chain.classify(&questions()).await;
        assert_eq!(outcome.attempts.len(), 1);
        assert_eq!(outcome.classified(), 3);
    }

    #[tokio::test]
    async fn unresolved_items_are_reported_as_failed() {
        let chain = ClassifierChain::new(vec![Box::new(HeuristicClassifier)]);
        let outcome = chain.classify(&questions()).await;
        assert_eq!(outcome.classified(), 2);
        assert_eq!(outcome.failed(), 1);
        assert!(outcome.results[1].is_none());
    }

    #[tokio::test]
    async fn misaligned_strategy_results_are_not_over_applied() {
        let chain = ClassifierChain::new(vec![Box::new(Short)]);
        let outcome = chain.classify(&questions()).await;
        assert_eq!(outcome.results.len(), 3);
        assert_eq!(outcome.classified(), 1);
        assert!(outcome.results[0].is_some());
    }

    #[tokio::test]
    async fn empty_input_runs_nothing() {
        let chain = ClassifierChain::new(vec![Box::new(HeuristicClassifier)]);
        let outcome = chain.classify(&[]).await;
        assert!(outcome.results.is_empty());
        assert!(outcome.attempts.is_empty());
    }
}
