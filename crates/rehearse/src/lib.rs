//! Mock-interview engine with an LLM input-safety guard pipeline.
//!
//! `rehearse` runs practice job interviews on top of an OpenAI-compatible
//! chat-completion API. Analysing the job description, planning the
//! interview and scoring answers are all LLM calls with light prompt
//! templating. The part owned locally is the **guard pipeline** that gates
//! every candidate answer before it reaches the interviewer model:
//!
//! ```text
//! answer ─▶ rate limit ─▶ length ─▶ intent (LLM) ─▶ moderation ─▶ interviewer ─▶ moderation ─▶ reply
//! ```
//!
//! # Getting started
//!
//! ```ignore
//! use rehearse::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), String> {
//!     let api_key = api_key_from_env()?;
//!     let client = OpenAiClient::new(api_key)?;
//!     let config = AppConfig::default();
//!     let interviewer = Interviewer::new(&client, &config);
//!
//!     let mut session = InterviewSession::new();
//!     interviewer
//!         .analyze_job_description(&mut session, "Senior Rust engineer, async networking...")
//!         .await
//!         .map_err(|e| e.to_string())?;
//!     interviewer
//!         .start_interview(&mut session, InterviewSettings::default())
//!         .await
//!         .map_err(|e| e.to_string())?;
//!     let outcome = interviewer
//!         .submit_answer(&mut session, "I would use a bounded channel...")
//!         .await
//!         .map_err(|e| e.to_string())?;
//!     println!("{outcome:?}");
//!     Ok(())
//! }
//! ```
//!
//! # Where to find things
//!
//! - **Talk to the provider:** [`OpenAiClient`] for chat completions and
//!   moderation, behind the [`LlmBackend`](backend::LlmBackend) trait.
//!   [`ScriptedBackend`](backend::ScriptedBackend) answers offline.
//! - **Gate user input:** [`guard`] holds each check and
//!   [`InputGuard::screen`](guard::InputGuard::screen) runs them in order.
//! - **Run an interview:** [`Interviewer`](interview::Interviewer) drives the
//!   JD analysis, the start of the interview and every guarded turn against an
//!   [`InterviewSession`](session::InterviewSession).
//! - **Configure:** [`AppConfig`](config::AppConfig) (TOML file + defaults).
//! - **Observe:** [`telemetry`] sets up `tracing` and keeps recent log lines
//!   for the web UI.

pub mod api;
pub mod backend;
pub mod config;
pub mod guard;
pub mod interview;
pub mod prelude;
pub mod prompts;
pub mod score;
pub mod session;
pub mod telemetry;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

use crate::api::retry::{RetryConfig, retry_transient};

// ── Constants ──────────────────────────────────────────────────────

/// Default base URL of the OpenAI-compatible REST API.
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Default model for every chat call.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Default model for the moderation endpoint.
pub const DEFAULT_MODERATION_MODEL: &str = "omni-moderation-latest";

/// Environment variable holding the provider API key.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Read the API key from [`API_KEY_ENV`].
pub fn api_key_from_env() -> Result<String, String> {
    std::env::var(API_KEY_ENV)
        .ok()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| format!("{API_KEY_ENV} not set"))
}

// ── Schema generation ──────────────────────────────────────────────

/// Generate a JSON Schema `serde_json::Value` for a type deriving
/// `schemars::JsonSchema`.
///
/// ```
/// use rehearse::json_schema_for;
/// use schemars::JsonSchema;
/// use serde::Deserialize;
///
/// #[derive(Deserialize, JsonSchema)]
/// struct Verdict {
///     score: u8,
///     #[serde(default)]
///     note: Option<String>,
/// }
///
/// let schema = json_schema_for::<Verdict>();
/// assert_eq!(schema["type"], "object");
/// assert!(schema["required"].as_array().unwrap().contains(&"score".into()));
/// ```
pub fn json_schema_for<T: JsonSchema>() -> serde_json::Value {
    let schema = schemars::schema_for!(T);
    serde_json::to_value(schema)
        .unwrap_or_else(|_| serde_json::json!({"type": "object", "properties": {}}))
}

// ── Message types ──────────────────────────────────────────────────

/// Role of a message in the conversation.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

/// A message in the conversation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

// ── Request types ──────────────────────────────────────────────────

/// Chat completion request body. Unset optional fields are omitted from
/// serialization so the provider applies its own defaults.
#[derive(Serialize, Debug, Default, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    // `Option` rather than a zero sentinel: the guard runs at exactly 0.0.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
}

impl ChatRequest {
    /// Request with a model, messages and sampling temperature.
    pub fn new(model: impl Into<String>, messages: Vec<Message>, temperature: f32) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: Some(temperature),
            ..Default::default()
        }
    }

    /// Ask the provider for a JSON object reply.
    pub fn json_object(mut self) -> Self {
        self.response_format = Some(ResponseFormat {
            fmt_type: ResponseFormatType::JsonObject,
        });
        self
    }
}

/// JSON output format type.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum ResponseFormatType {
    #[serde(rename = "json_object")]
    JsonObject,
}

/// Output format requested from the model.
#[derive(Serialize, Debug, Clone)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub fmt_type: ResponseFormatType,
}

/// Moderation request body.
#[derive(Serialize, Debug)]
pub struct ModerationRequest<'a> {
    pub model: &'a str,
    pub input: &'a str,
}

// ── Response types ─────────────────────────────────────────────────

#[derive(Deserialize, Debug)]
struct RawChatResponse {
    choices: Option<Vec<RawChoice>>,
    error: Option<ApiErrorResponse>,
    #[serde(default)]
    usage: Option<UsageInfo>,
}

#[derive(Deserialize, Debug)]
struct RawChoice {
    message: RawResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct RawResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ApiErrorResponse {
    message: String,
}

#[derive(Deserialize, Debug)]
struct RawModerationResponse {
    #[serde(default)]
    results: Vec<RawModerationResult>,
    error: Option<ApiErrorResponse>,
}

#[derive(Deserialize, Debug)]
struct RawModerationResult {
    flagged: bool,
    #[serde(default)]
    categories: BTreeMap<String, Option<bool>>,
}

/// Clean return type from [`OpenAiClient::chat()`].
#[derive(Debug, Clone, Default)]
pub struct ChatCompletion {
    pub content: Option<String>,
    pub usage: Option<UsageInfo>,
    pub finish_reason: Option<String>,
}

impl ChatCompletion {
    /// The reply text, or an empty string when the model returned none.
    pub fn content_str(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }
}

/// Token usage statistics.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageInfo {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

impl UsageInfo {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Verdict of the provider moderation endpoint for a single input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ModerationResult {
    pub flagged: bool,
    /// Names of the categories the provider marked as violated.
    pub categories: Vec<String>,
}

// ── Client ─────────────────────────────────────────────────────────

/// Async HTTP client for the OpenAI chat-completion and moderation APIs.
pub struct OpenAiClient {
    pub(crate) client: reqwest::Client,
    pub(crate) api_key: String,
    pub(crate) base_url: String,
    pub(crate) moderation_model: String,
    pub(crate) retry: RetryConfig,
}

impl OpenAiClient {
    /// Create a client for the public OpenAI endpoint.
    pub fn new(api_key: impl Into<String>) -> Result<Self, String> {
        Self::with_base_url(api_key, OPENAI_BASE_URL)
    }

    /// Create a client for any OpenAI-compatible endpoint.
    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("rehearse/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| format!("failed to build HTTP client: {e}"))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            moderation_model: DEFAULT_MODERATION_MODEL.to_string(),
            retry: RetryConfig::default(),
        })
    }

    /// Build a client from an [`AppConfig`](config::AppConfig) and an API key.
    pub fn from_config(
        api_key: impl Into<String>,
        config: &config::AppConfig,
    ) -> Result<Self, String> {
        Ok(Self::with_base_url(api_key, &config.provider.base_url)?
            .with_moderation_model(&config.provider.moderation_model)
            .with_retry(RetryConfig::with_retries(config.provider.max_retries)))
    }

    pub fn with_moderation_model(mut self, model: impl Into<String>) -> Self {
        self.moderation_model = model.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// POST a JSON body and return the raw response text, failing on non-2xx.
    async fn post_json<B: Serialize>(&self, path: &str, body: &B) -> Result<String, String> {
        let url = format!("{}/{path}", self.base_url);
        let start = Instant::now();

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| format!("failed to read response: {e}"))?;

        debug!(
            "{path} response: HTTP {} in {:.1}s ({} bytes)",
            status,
            start.elapsed().as_secs_f64(),
            text.len()
        );

        if !status.is_success() {
            return Err(format!("OpenAI API HTTP {status}: {text}"));
        }
        Ok(text)
    }

    /// Send a chat completion request.
    pub async fn chat(&self, body: &ChatRequest) -> Result<ChatCompletion, String> {
        debug!(
            "LLM request: model={}, messages={}, temp={:?}",
            body.model,
            body.messages.len(),
            body.temperature,
        );
        trace!(
            "Request payload size: {} bytes",
            serde_json::to_string(body).map_or(0, |s| s.len())
        );

        let text = retry_transient(&self.retry, "chat", || {
            self.post_json("chat/completions", body)
        })
        .await?;

        parse_chat_response(&text)
    }

    /// Classify `input` with the moderation endpoint.
    pub async fn moderate(&self, input: &str) -> Result<ModerationResult, String> {
        let body = ModerationRequest {
            model: &self.moderation_model,
            input,
        };
        debug!(
            "Moderation request: model={}, {} chars",
            self.moderation_model,
            input.chars().count()
        );

        let text = retry_transient(&self.retry, "moderation", || {
            self.post_json("moderations", &body)
        })
        .await?;

        parse_moderation_response(&text)
    }
}

fn parse_chat_response(text: &str) -> Result<ChatCompletion, String> {
    let parsed: RawChatResponse =
        serde_json::from_str(text).map_err(|e| format!("failed to parse response: {e}"))?;

    if let Some(err) = parsed.error {
        return Err(format!("OpenAI API error: {}", err.message));
    }

    if let Some(ref usage) = parsed.usage {
        debug!(
            "Token usage: prompt={}, completion={}, total={}",
            usage.prompt_tokens, usage.completion_tokens, usage.total_tokens,
        );
    }

    let choice = parsed.choices.and_then(|c| c.into_iter().next());
    match choice {
        Some(c) => Ok(ChatCompletion {
            content: c.message.content,
            usage: parsed.usage,
            finish_reason: c.finish_reason,
        }),
        None => {
            debug!("LLM output: empty (no choices)");
            Ok(ChatCompletion {
                content: None,
                usage: parsed.usage,
                finish_reason: None,
            })
        }
    }
}

fn parse_moderation_response(text: &str) -> Result<ModerationResult, String> {
    let parsed: RawModerationResponse = serde_json::from_str(text)
        .map_err(|e| format!("failed to parse moderation response: {e}"))?;

    if let Some(err) = parsed.error {
        return Err(format!("OpenAI API error: {}", err.message));
    }

    let first = parsed
        .results
        .into_iter()
        .next()
        .ok_or_else(|| "moderation response contained no results".to_string())?;

    Ok(ModerationResult {
        flagged: first.flagged,
        categories: first
            .categories
            .into_iter()
            .filter(|(_, hit)| hit.unwrap_or(false))
            .map(|(name, _)| name)
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_constructors() {
        let sys = Message::system("hello");
        assert_eq!(sys.role, MessageRole::System);
        assert_eq!(sys.content, "hello");

        let user = Message::user("world");
        assert_eq!(user.role, MessageRole::User);

        let reply = Message::assistant("next question");
        assert_eq!(reply.role, MessageRole::Assistant);
        assert_eq!(reply.content, "next question");
    }

    #[test]
    fn chat_request_keeps_zero_temperature() {
        let req = ChatRequest::new("gpt-4o-mini", vec![Message::user("hi")], 0.0);
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["temperature"], 0.0);
        assert!(json.get("response_format").is_none());
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn json_object_sets_response_format() {
        let req = ChatRequest::new("m", vec![], 0.3).json_object();
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["response_format"]["type"], "json_object");
    }

    #[test]
    fn parses_chat_completion() {
        let body = r#"{
            "choices": [{"message": {"role": "assistant", "content": "Tell me about Rust."}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 5, "total_tokens": 17}
        }"#;
        let completion = parse_chat_response(body).unwrap();
        assert_eq!(completion.content_str(), "Tell me about Rust.");
        assert_eq!(completion.usage, Some(UsageInfo::new(12, 5)));
        assert_eq!(completion.finish_reason.as_deref(), Some("stop"));
    }

    #[test]
    fn chat_error_body_is_an_error() {
        let body = r#"{"error": {"message": "model not found"}}"#;
        let err = parse_chat_response(body).unwrap_err();
        assert!(err.contains("model not found"));
    }

    #[test]
    fn parses_flagged_moderation() {
        let body = r#"{
            "id": "modr-1",
            "model": "omni-moderation-latest",
            "results": [{
                "flagged": true,
                "categories": {"violence": true, "harassment": false, "self-harm/intent": null}
            }]
        }"#;
        let result = parse_moderation_response(body).unwrap();
        assert!(result.flagged);
        assert_eq!(result.categories, vec!["violence".to_string()]);
    }

    #[test]
    fn empty_moderation_results_is_an_error() {
        let err = parse_moderation_response(r#"{"results": []}"#).unwrap_err();
        assert!(err.contains("no results"));
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let client = OpenAiClient::with_base_url("k", "http://localhost:8080/v1/").unwrap();
        assert_eq!(client.base_url, "http://localhost:8080/v1");
    }
}
