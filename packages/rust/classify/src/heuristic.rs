//! Offline leading-verb classifier.

use async_trait::async_trait;

use exampaper_shared::{Classification, CognitiveLabel};

use crate::strategy::{Attempt, ClassifierStrategy};

/// Confidence attached to every heuristic label.
pub const HEURISTIC_CONFIDENCE: f32 = 0.7;

/// Command verbs, grouped by the level they usually signal.
const VERB_TABLE: &[(CognitiveLabel, &[&str])] = &[
    (
        CognitiveLabel::Remember,
        &["define", "list", "name", "state", "identify"],
    ),
    (
        CognitiveLabel::Understand,
        &["explain", "describe", "summarize", "summarise", "illustrate"],
    ),
    (
        CognitiveLabel::Apply,
        &["solve", "implement", "write", "use", "apply"],
    ),
    (
        CognitiveLabel::Analyze,
        &["compare", "differentiate", "analyze", "analyse", "distinguish"],
    ),
    (
        CognitiveLabel::Evaluate,
        &["justify", "evaluate", "critique", "assess"],
    ),
    (
        CognitiveLabel::Create,
        &["design", "propose", "construct", "develop"],
    ),
];

/// Labels a question by its first word when that word is a known command verb.
///
/// Never calls out; items with no recognizable verb stay unresolved.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicClassifier;

impl HeuristicClassifier {
    pub fn classify_one(&self, question: &str) -> Option<Classification> {
        let verb = leading_verb(question)?;
        VERB_TABLE
            .iter()
            .find(|(_, verbs)| verbs.contains(&verb.as_str()))
            .map(|(label, _)| Classification::new(*label, Some(verb.clone()), HEURISTIC_CONFIDENCE))
    }
}

#[async_trait]
impl ClassifierStrategy for HeuristicClassifier {
    fn name(&self) -> &str {
        "heuristic"
    }

    async fn classify(&self, questions: &[String]) -> Attempt {
        Attempt {
            results: questions.iter().map(|q| self.classify_one(q)).collect(),
            calls: 0,
        }
    }
}

/// First word after an optional `Q<digits>` marker, lower-cased and
/// stripped of `.`, `:` and `)`.
fn leading_verb(question: &str) -> Option<String> {
    let mut words = question.split_whitespace();
    let mut first = words.next()?;

    if is_question_marker(first) {
        first = words.next()?;
    }

    let word = first.trim_matches(&['.', ':', ')'][..]).to_lowercase();
    (!word.is_empty()).then_some(word)
}

fn is_question_marker(word: &str) -> bool {
    let word = word.trim_end_matches(&['.', ':', ')'][..]);
    let digits = word.strip_prefix('Q').or_else(|| word.strip_prefix('q'));
    digits.is_some_and(|d| !d.is_empty() && d.bytes().all(|b| b.is_ascii_digit()))
}
