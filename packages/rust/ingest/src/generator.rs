//! Question generation from source chunks.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, instrument};

use exampaper_llm::{ChatClient, ChatRequest};
use exampaper_shared::{AppConfig, CandidateQuestion, Result};

use crate::chunker::TextChunk;

/// Questions requested per chunk.
pub const QUESTIONS_PER_CHUNK: usize = 12;

/// Extracted texts this short or shorter are discarded.
const MIN_QUESTION_CHARS: usize = 5;

static Q_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^Q\d+\.?\s+(.+)$").expect("valid regex"));

static NUMBERED_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(Q?\d+[.)]\s+|Q?\d+\s+)").expect("valid regex"));

/// Produces raw candidate questions for one chunk of source text.
///
/// Output is untrusted: it goes through validation before anything else
/// looks at it.
#[async_trait]
pub trait QuestionGenerator: Send + Sync {
    async fn generate(&self, chunk: &TextChunk) -> Result<Vec<CandidateQuestion>>;
}

/// Generator backed by a chat completion model.
#[derive(Debug, Clone)]
pub struct LlmQuestionGenerator {
    client: ChatClient,
    model: String,
    temperature: f32,
}

impl LlmQuestionGenerator {
    pub fn new(client: ChatClient, model: impl Into<String>, temperature: f32) -> Self {
        Self {
            client,
            model: model.into(),
            temperature,
        }
    }

    pub fn from_config(client: ChatClient, config: &AppConfig) -> Self {
        Self::new(
            client,
            &config.llm.generation_model,
            config.llm.generation_temperature,
        )
    }
}

#[async_trait]
impl QuestionGenerator for LlmQuestionGenerator {
    #[instrument(skip_all, fields(chunk = chunk.id, words = chunk.word_count))]
    async fn generate(&self, chunk: &TextChunk) -> Result<Vec<CandidateQuestion>> {
        if chunk.text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let request =
            ChatRequest::new(&self.model, self.temperature, generation_prompt(&chunk.text));
        let completion = self.client.complete(&request).await?;
        let questions = parse_question_lines(&completion.content, Some(chunk.id));

        debug!(questions = questions.len(), "questions generated");
        Ok(questions)
    }
}

fn generation_prompt(chunk_text: &str) -> String {
    let format_lines: Vec<String> = (1..=QUESTIONS_PER_CHUNK)
        .map(|i| format!("Q{i}. <question>"))
        .collect();

    format!(
        "You are a university-level Computer Science examiner responsible for setting internal and end-semester examination papers.\n\n\
         Generate clear, meaningful, exam-ready questions strictly based on the syllabus content provided.\n\n\
         STRICT RULES:\n\
         - Every question must test a specific Computer Science concept explicitly mentioned in the syllabus.\n\
         - Every technical noun used must appear in the syllabus or be a directly related standard CS term.\n\
         - Do NOT invent abstract or placeholder topic names.\n\
         - Do NOT use vague words such as Zero, Unlike, Therefore, Something, Any Question.\n\
         - Questions must be suitable for a real written university exam.\n\n\
         QUESTION REQUIREMENTS:\n\
         - Generate exactly {QUESTIONS_PER_CHUNK} questions.\n\
         - Mix of short-answer and descriptive style questions.\n\
         - Use appropriate academic verbs (define, explain, differentiate, write, implement).\n\n\
         SYLLABUS CONTENT:\n{chunk_text}\n\n\
         OUTPUT FORMAT (STRICT):\n{}\n\n\
         Do NOT include difficulty levels, marks, explanations, or extra text.",
        format_lines.join("\n")
    )
}

/// Pull question texts out of `Q<n>. <question>` lines.
///
/// If no line has that form, falls back to any numbered-list prefix
/// (`3.`, `3)`, `Q3)`, `3 `). Texts of five characters or fewer are dropped.
pub fn parse_question_lines(output: &str, source_unit_id: Option<usize>) -> Vec<CandidateQuestion> {
    let lines: Vec<&str> = output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    let primary: Vec<CandidateQuestion> = lines
        .iter()
        .filter_map(|line| Q_LINE_RE.captures(line))
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().trim()))
        .filter(|text| text.chars().count() > MIN_QUESTION_CHARS)
        .map(|text| CandidateQuestion::new(text, source_unit_id))
        .collect();

    if !primary.is_empty() {
        return primary;
    }

    lines
        .iter()
        .filter(|line| NUMBERED_PREFIX_RE.is_match(line))
        .map(|line| NUMBERED_PREFIX_RE.replace(line, "").trim().to_string())
        .filter(|text| text.chars().count() > MIN_QUESTION_CHARS)
        .map(|text| CandidateQuestion::new(text, source_unit_id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use exampaper_shared::{ExamPaperError, LlmConfig};
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn texts(questions: &[CandidateQuestion]) -> Vec<&str> {
        questions.iter().map(|q| q.text.as_str()).collect()
    }

    #[test]
    fn test_parses_q_lines() {
        let output = "Q1. Define a routing table.\nQ2 Explain TCP slow start.\n\nq3.   Compare RIP and OSPF.\nHere you go!";
        let questions = parse_question_lines(output, Some(4));
        assert_eq!(
            texts(&questions),
            vec![
                "Define a routing table.",
                "Explain TCP slow start.",
                "Compare RIP and OSPF."
            ]
        );
        assert!(questions.iter().all(|q| q.source_unit_id == Some(4)));
    }

    #[test]
    fn test_drops_tiny_texts() {
        let questions = parse_question_lines("Q1. Why?\nQ2. State ARP's role.", None);
        assert_eq!(texts(&questions), vec!["State ARP's role."]);
    }

    #[test]
    fn test_falls_back_to_numbered_list() {
        let output = "1. Define subnetting.\n2) Explain CIDR notation.\n3 Describe ARP spoofing.\n- not numbered";
        let questions = parse_question_lines(output, None);
        assert_eq!(
            texts(&questions),
            vec![
                "Define subnetting.",
                "Explain CIDR notation.",
                "Describe ARP spoofing."
            ]
        );
    }

    #[test]
    fn test_primary_pattern_wins_over_fallback() {
        let output = "1. Ignored numbered line here.\nQ1. Define a socket in detail.";
        let questions = parse_question_lines(output, None);
        assert_eq!(texts(&questions), vec!["Define a socket in detail."]);
    }

    #[test]
    fn test_nothing_recognizable() {
        assert!(parse_question_lines("I cannot help with that.", None).is_empty());
        assert!(parse_question_lines("", None).is_empty());
    }

    #[test]
    fn test_prompt_embeds_chunk_and_format() {
        let prompt = generation_prompt("Routing algorithms.");
        assert!(prompt.contains("SYLLABUS CONTENT:\nRouting algorithms."));
        assert!(prompt.contains("Q12. <question>"));
        assert!(!prompt.contains("Q13."));
    }

    fn client_for(server: &MockServer) -> ChatClient {
        let config = LlmConfig {
            api_base: server.uri(),
            timeout_secs: 5,
            ..LlmConfig::default()
        };
        ChatClient::new(&config, "sk-test").unwrap()
    }

    fn chunk(id: usize, text: &str) -> TextChunk {
        TextChunk {
            id,
            text: text.into(),
            word_count: text.split_whitespace().count(),
        }
    }

    #[tokio::test]
    async fn test_llm_generator_tags_chunk_id() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_string_contains("Link-state routing"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{ "message": { "content": "Q1. Explain link-state routing.\nQ2. Define a routing protocol." } }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let generator = LlmQuestionGenerator::new(client_for(&server), "gpt-4o-mini", 0.3);
        let questions = generator
            .generate(&chunk(2, "Link-state routing floods link costs."))
            .await
            .unwrap();

        assert_eq!(questions.len(), 2);
        assert!(questions.iter().all(|q| q.source_unit_id == Some(2)));
    }

    #[tokio::test]
    async fn test_llm_generator_surfaces_backend_errors() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let generator = LlmQuestionGenerator::new(client_for(&server), "gpt-4o-mini", 0.3);
        let err = generator.generate(&chunk(0, "Some text about sockets.")).await.unwrap_err();
        assert!(matches!(err, ExamPaperError::Llm(_)));
    }
}
