//! Model-backed classifier strategies.

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use exampaper_llm::{ChatClient, ChatRequest};
use exampaper_shared::{AppConfig, Classification};

use crate::labels::LabelNormalizer;
use crate::parser::{decode_batch, parse_single};
use crate::strategy::{Attempt, ClassifierStrategy};

/// Confidence attached to labels recovered from a batch response, which
/// carries no per-item confidence of its own.
pub const BATCH_CONFIDENCE: f32 = 0.8;

const LEVELS: &str = "Remember, Understand, Apply, Analyze, Evaluate, Create";

// ---------------------------------------------------------------------------
// Batch
// ---------------------------------------------------------------------------

/// Classifies up to `batch_size` questions per request.
#[derive(Debug, Clone)]
pub struct LlmBatchClassifier {
    client: ChatClient,
    model: String,
    temperature: f32,
    batch_size: usize,
    normalizer: LabelNormalizer,
}

impl LlmBatchClassifier {
    pub fn new(
        client: ChatClient,
        model: impl Into<String>,
        temperature: f32,
        batch_size: usize,
        normalizer: LabelNormalizer,
    ) -> Self {
        Self {
            client,
            model: model.into(),
            temperature,
            batch_size: batch_size.max(1),
            normalizer,
        }
    }

    pub fn from_config(
        client: ChatClient,
        config: &AppConfig,
        normalizer: LabelNormalizer,
    ) -> Self {
        Self::new(
            client,
            &config.llm.classification_model,
            config.llm.classification_temperature,
            config.defaults.classify_batch_size,
            normalizer,
        )
    }

    async fn classify_chunk(&self, questions: &[String]) -> Vec<Option<Classification>> {
        let request = ChatRequest::new(&self.model, self.temperature, batch_prompt(questions));

        let raw = match self.client.complete(&request).await {
            Ok(completion) => completion.content,
            Err(e) => {
                warn!(error = %e, batch = questions.len(), "batch classification request failed");
                return vec![None; questions.len()];
            }
        };

        let parsed = decode_batch(&raw, questions.len(), &self.normalizer);
        if let Some(failure) = parsed.failure {
            warn!(?failure, batch = questions.len(), "batch response unusable");
        }
        debug!(resolved = parsed.resolved(), batch = questions.len(), "batch parsed");

        parsed
            .labels
            .into_iter()
            .map(|label| label.map(|l| Classification::new(l, None, BATCH_CONFIDENCE)))
            .collect()
    }
}

#[async_trait]
impl ClassifierStrategy for LlmBatchClassifier {
    fn name(&self) -> &str {
        "llm_batch"
    }

    #[instrument(skip_all, fields(questions = questions.len(), batch_size = self.batch_size))]
    async fn classify(&self, questions: &[String]) -> Attempt {
        let mut attempt = Attempt::default();
        for chunk in questions.chunks(self.batch_size) {
            attempt.results.extend(self.classify_chunk(chunk).await);
            attempt.calls += 1;
        }
        attempt
    }
}

fn batch_prompt(questions: &[String]) -> String {
    let numbered: Vec<String> = questions
        .iter()
        .enumerate()
        .map(|(i, q)| format!("{}. {}", i + 1, one_line(q)))
        .collect();

    format!(
        "Classify each Computer Science exam question below by Bloom's Taxonomy level.\n\n\
         Questions:\n{}\n\n\
         Return ONLY a JSON array with one object per question, in this exact form:\n\
         [{{\"index\": 1, \"label\": \"<one of: {LEVELS}>\"}}]\n\
         Use the question numbers above as the index. Do not include any explanation.",
        numbered.join("\n")
    )
}

// ---------------------------------------------------------------------------
// Single
// ---------------------------------------------------------------------------

/// One request per question; reads level, verb and confidence.
#[derive(Debug, Clone)]
pub struct LlmSingleClassifier {
    client: ChatClient,
    model: String,
    temperature: f32,
    normalizer: LabelNormalizer,
}

impl LlmSingleClassifier {
    pub fn new(
        client: ChatClient,
        model: impl Into<String>,
        temperature: f32,
        normalizer: LabelNormalizer,
    ) -> Self {
        Self {
            client,
            model: model.into(),
            temperature,
            normalizer,
        }
    }

    pub fn from_config(
        client: ChatClient,
        config: &AppConfig,
        normalizer: LabelNormalizer,
    ) -> Self {
        Self::new(
            client,
            &config.llm.classification_model,
            config.llm.classification_temperature,
            normalizer,
        )
    }

    async fn classify_one(&self, question: &str) -> Option<Classification> {
        if question.trim().is_empty() {
            return None;
        }

        let request =
            ChatRequest::new(&self.model, self.temperature, single_prompt(question)).json();
        match self.client.complete(&request).await {
            Ok(completion) => {
                let parsed = parse_single(&completion.content, &self.normalizer);
                if parsed.is_none() {
                    debug!("single classification response unusable");
                }
                parsed
            }
            Err(e) => {
                warn!(error = %e, "single classification request failed");
                None
            }
        }
    }
}

#[async_trait]
impl ClassifierStrategy for LlmSingleClassifier {
    fn name(&self) -> &str {
        "llm_single"
    }

    #[instrument(skip_all, fields(questions = questions.len()))]
    async fn classify(&self, questions: &[String]) -> Attempt {
        let mut attempt = Attempt::default();
        for question in questions {
            attempt.results.push(self.classify_one(question).await);
            if !question.trim().is_empty() {
                attempt.calls += 1;
            }
        }
        attempt
    }
}

fn single_prompt(question: &str) -> String {
    format!(
        "Classify the following Computer Science exam question according to Bloom's Taxonomy.\n\n\
         Question: {}\n\n\
         Return ONLY a JSON object with this exact structure:\n\
         {{\"level\": \"<one of: {LEVELS}>\", \"verb\": \"<the main cognitive verb in the question>\", \"confidence\": <float between 0.0 and 1.0>}}\n\n\
         Do not include any explanation or additional text.",
        one_line(question)
    )
}

fn one_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use exampaper_shared::{CognitiveLabel, LlmConfig};
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> ChatClient {
        let config = LlmConfig {
            api_base: server.uri(),
            timeout_secs: 5,
            ..LlmConfig::default()
        };
        ChatClient::new(&config, "sk-test").unwrap()
    }

    fn reply(content: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{ "message": { "content": content } }]
        }))
    }

    fn labels(attempt: &Attempt) -> Vec<Option<CognitiveLabel>> {
        attempt.results.iter().map(|r| r.as_ref().map(|c| c.label)).collect()
    }

    #[test]
    fn batch_prompt_numbers_questions_from_one() {
        let prompt = batch_prompt(&["Define a\nrouter.".into(), "Compare A and B.".into()]);
        assert!(prompt.contains("1. Define a router."));
        assert!(prompt.contains("2. Compare A and B."));
        assert!(prompt.contains("\"index\": 1"));
    }

    #[tokio::test]
    async fn batch_classifier_splits_and_aligns() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_string_contains("Define latency"))
            .respond_with(reply(
                "```json\n[{\"index\": 2, \"label\": \"Apply\"}, {\"index\": 1, \"label\": \"Remembering\"},]\n```",
            ))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_string_contains("Design a cache"))
            .respond_with(reply("Sorry, I can't help with that."))
            .expect(1)
            .mount(&server)
            .await;

        let classifier = LlmBatchClassifier::new(
            client_for(&server),
            "gpt-4o-mini",
            0.1,
            2,
            LabelNormalizer::default(),
        );
        let questions = vec![
            "Define latency.".to_string(),
            "Use Dijkstra on this graph.".to_string(),
            "Design a cache for a web server.".to_string(),
        ];
        let attempt = classifier.classify(&questions).await;

        assert_eq!(attempt.calls, 2);
        assert_eq!(
            labels(&attempt),
            vec![Some(CognitiveLabel::Remember), Some(CognitiveLabel::Apply), None]
        );
        assert_eq!(attempt.results[0].as_ref().unwrap().confidence, BATCH_CONFIDENCE);
    }

    #[tokio::test]
    async fn batch_http_failure_is_absent_not_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let classifier = LlmBatchClassifier::new(
            client_for(&server),
            "gpt-4o-mini",
            0.1,
            15,
            LabelNormalizer::default(),
        );
        let attempt = classifier
            .classify(&["Define latency.".to_string(), "List two protocols.".to_string()])
            .await;
        assert_eq!(attempt.calls, 1);
        assert_eq!(labels(&attempt), vec![None, None]);
    }

    #[tokio::test]
    async fn single_classifier_reads_level_verb_confidence() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_string_contains("json_object"))
            .respond_with(reply(
                r#"{"level": "Evaluate", "verb": "justify", "confidence": 0.9}"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let classifier = LlmSingleClassifier::new(
            client_for(&server),
            "gpt-4o-mini",
            0.1,
            LabelNormalizer::default(),
        );
        let attempt = classifier
            .classify(&[
                "Is normalisation always worth it for OLTP schemas?".to_string(),
                "  ".to_string(),
            ])
            .await;

        assert_eq!(attempt.calls, 1);
        let first = attempt.results[0].as_ref().unwrap();
        assert_eq!(first.label, CognitiveLabel::Evaluate);
        assert_eq!(first.verb.as_deref(), Some("justify"));
        assert!(attempt.results[1].is_none());
    }

    #[tokio::test]
    async fn single_classifier_rejects_unknown_level() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(reply(r#"{"level": "Synthesise-ish", "verb": "x"}"#))
            .mount(&server)
            .await;

        let classifier = LlmSingleClassifier::new(
            client_for(&server),
            "gpt-4o-mini",
            0.1,
            LabelNormalizer::default(),
        );
        let attempt = classifier.classify(&["Why do caches help?".to_string()]).await;
        assert_eq!(labels(&attempt), vec![None]);
    }
}
