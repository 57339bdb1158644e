//! Minimal client for OpenAI-compatible chat completion APIs.
//!
//! Question generation and label classification both go through
//! [`ChatClient::complete`]: one user message in, the first choice's text
//! out. Interpreting that text is the caller's job.

use std::time::{Duration, Instant};

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use url::Url;

use exampaper_shared::{ExamPaperError, LlmConfig, Result};

/// User-Agent string for API requests.
const USER_AGENT: &str = concat!("ExamPaper/", env!("CARGO_PKG_VERSION"));

/// Longest body excerpt quoted in an error message.
const ERROR_EXCERPT_CHARS: usize = 200;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// One completion request.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub temperature: f32,
    pub prompt: String,
    /// Ask the server for a JSON object response (`response_format`).
    pub json_mode: bool,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, temperature: f32, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature,
            prompt: prompt.into(),
            json_mode: false,
        }
    }

    pub fn json(mut self) -> Self {
        self.json_mode = true;
        self
    }
}

/// Token accounting reported by the server, when present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
}

/// The text of the first choice plus call metadata.
#[derive(Debug, Clone)]
pub struct ChatCompletion {
    pub content: String,
    pub usage: Option<TokenUsage>,
    pub latency_ms: u64,
}

#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: [WireMessage<'a>; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    choices: Vec<WireChoice>,
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct WireChoiceMessage {
    content: Option<String>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// HTTP client bound to one API base and key. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ChatClient {
    client: Client,
    endpoint: Url,
    api_key: String,
}

impl ChatClient {
    /// Build a client from the `[llm]` config section and a resolved API key.
    pub fn new(config: &LlmConfig, api_key: impl Into<String>) -> Result<Self> {
        let endpoint = completions_url(&config.api_base)?;

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ExamPaperError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            api_key: api_key.into(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Send one prompt and return the first choice's trimmed content.
    #[instrument(skip_all, fields(model = %request.model, json = request.json_mode))]
    pub async fn complete(&self, request: &ChatRequest) -> Result<ChatCompletion> {
        let body = WireRequest {
            model: &request.model,
            temperature: request.temperature,
            messages: [WireMessage {
                role: "user",
                content: &request.prompt,
            }],
            response_format: request.json_mode.then_some(ResponseFormat {
                kind: "json_object",
            }),
        };

        let started = Instant::now();
        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ExamPaperError::Network(format!("{}: {e}", self.endpoint)))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            ExamPaperError::Network(format!("{}: failed to read body: {e}", self.endpoint))
        })?;
        let latency_ms = started.elapsed().as_millis() as u64;

        if !status.is_success() {
            warn!(%status, "completion request failed");
            return Err(ExamPaperError::Llm(format!(
                "HTTP {status}: {}",
                excerpt(&text)
            )));
        }

        let parsed: WireResponse = serde_json::from_str(&text).map_err(|e| {
            ExamPaperError::Llm(format!("invalid completion body: {e} (got: {})", excerpt(&text)))
        })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| ExamPaperError::Llm("empty completion".into()))?;

        debug!(
            latency_ms,
            chars = content.len(),
            prompt_tokens = parsed.usage.map(|u| u.prompt_tokens),
            completion_tokens = parsed.usage.map(|u| u.completion_tokens),
            "completion received"
        );

        Ok(ChatCompletion {
            content,
            usage: parsed.usage,
            latency_ms,
        })
    }
}

/// `<api_base>/chat/completions`, tolerating a trailing slash on the base.
fn completions_url(api_base: &str) -> Result<Url> {
    let base = format!("{}/", api_base.trim().trim_end_matches('/'));
    let base = Url::parse(&base)
        .map_err(|e| ExamPaperError::config(format!("invalid api_base {api_base:?}: {e}")))?;
    if !matches!(base.scheme(), "http" | "https") {
        return Err(ExamPaperError::config(format!(
            "api_base must be http(s), got {api_base:?}"
        )));
    }
    base.join("chat/completions")
        .map_err(|e| ExamPaperError::config(format!("invalid api_base {api_base:?}: {e}")))
}

fn excerpt(text: &str) -> &str {
    match text.char_indices().nth(ERROR_EXCERPT_CHARS) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
